// cbs-aws - AWS SDK adapters for the CBS transport ports
//
// Each adapter wraps one SDK client and implements a cbs-core port. The
// Lambda binaries pick the credentials each client is built with.

mod codepipeline;
mod dynamodb;
mod s3;
pub mod session;
mod sns;
mod sqs;

pub use codepipeline::CodePipelineTrigger;
pub use dynamodb::{AlarmSuppressionTable, PartnerInventoryTable, UnknownWorkloadTable};
pub use s3::S3ObjectStore;
pub use sns::SnsNotifier;
pub use sqs::SqsQueue;
