// Transport Lambda binary
//
// Build with: cargo build -p cbs-lambda --bin transport

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), lambda_runtime::Error> {
    cbs_lambda::transport::run().await
}
