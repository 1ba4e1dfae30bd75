// DLQ triage Lambda binary

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), lambda_runtime::Error> {
    cbs_lambda::triage::run().await
}
