use std::process::ExitCode;
use trusted_request::{request::response_builder, Config, RequestExecutor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trusted_request=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: trusted-request <url> [method]");
        return ExitCode::from(2);
    };
    let method = args.next().unwrap_or_else(|| "GET".to_string());

    let config = Config::from_env();
    let spec = config.request(&method, &url);
    tracing::info!("{} {}", spec.method, spec.url);

    let executor = RequestExecutor::new();
    match executor.execute(spec).await {
        Ok(response) => {
            println!("{}", response_builder::to_json(&response));
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::info!(code = err.code(), retryable = err.is_retryable(), "{}", err);
            println!("{}", err.to_json());
            ExitCode::FAILURE
        }
    }
}
