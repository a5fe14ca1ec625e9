//! Multiblog Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    multiblog_backend::run().await;
}
