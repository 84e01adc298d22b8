use std::process::ExitCode;
use std::sync::Arc;

use realtor_client::{
    AppClient,
    access::features,
    auth::OAuthProvider,
    client::RequestSpec,
    config::Config,
    host::ConsoleHost,
};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: realtor-client <status|login EMAIL PASSWORD|register NAME EMAIL PASSWORD|logout|refresh|oauth google|apple|get ENDPOINT|features|watch>";

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let storage = match AppClient::connect_storage(&config).await {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("Failed to open session storage: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let app = match AppClient::build(config, storage, Arc::new(ConsoleHost)).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to build client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let ok = match args.as_slice() {
        ["status"] | [] => true,
        ["login", email, password] => app.auth.login(email, password).await.is_ok(),
        ["register", name, email, password] => {
            app.auth.register(name, email, password).await.is_ok()
        }
        ["logout"] => app.auth.logout().await.is_ok(),
        ["refresh"] => app.auth.refresh().await,
        ["oauth", provider] => match provider.parse::<OAuthProvider>() {
            Ok(provider) => app.auth.oauth(provider).await.is_ok(),
            Err(e) => {
                eprintln!("{}", e);
                false
            }
        },
        ["get", endpoint] => {
            match app
                .client
                .request::<Value>(RequestSpec::get(*endpoint).cacheable())
                .await
            {
                Ok(body) => {
                    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
                    true
                }
                Err(_) => false,
            }
        }
        ["features"] => {
            for feature in features::ALL {
                println!("{:<22} {}", feature, app.access.has_feature_access(feature));
            }
            true
        }
        ["watch"] => {
            // 保持运行，定时刷新并同步其他实例的登录状态
            let tasks = app.start_background();
            tracing::info!("Watching session, press Ctrl-C to exit");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tasks.stop().await;
            true
        }
        _ => {
            eprintln!("{}", USAGE);
            false
        }
    };

    if ok {
        print_status(&app);
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_status(app: &AppClient) {
    let session = app.session.get();
    match session.user() {
        Some(user) => println!(
            "signed in as {} <{}>{}; active subscription: {}",
            user.name,
            user.email,
            if session.is_degraded() { " (offline)" } else { "" },
            app.access.has_active_subscription()
        ),
        None => println!("signed out"),
    }
}
