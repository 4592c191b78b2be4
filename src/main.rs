mod supervisor;

use api::{render::Renderer, Bot, PublicKey};
use core::{num::NonZeroU64, time::Duration};
use db::{Config, Database, NoTls};
use http_body_util::Full;
use hyper::{server::conn::http1, service::service_fn, Response, Uri};
use hyper_util::rt::TokioIo;
use std::{
    convert::Infallible,
    env,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tokio::{net::TcpListener, runtime::Runtime};

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: core::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => Ok(value.parse()?),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err.into()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parse environment variables
    let port = env::var("PORT")?.parse()?;
    let app: NonZeroU64 = env::var("APP_ID")?.parse()?;
    let token = env::var("BOT_TOKEN")?;
    let mut public = [0; 32];
    hex::decode_to_slice(env::var("PUBLIC_KEY")?, &mut public)?;
    let public = PublicKey::from_bytes(&public)?;

    let render_url: Uri = var_or("RENDER_URL", Uri::from_static("http://127.0.0.1:3001/render"))?;
    let render_timeout = Duration::from_millis(var_or("RENDER_TIMEOUT_MS", 10_000)?);
    let sidecar_delay = Duration::from_millis(var_or("SIDECAR_DELAY_MS", 3_000)?);
    let render_command = env::var("RENDER_COMMAND").ok();
    let sidecar_commands = env::var("SIDECAR_COMMANDS").ok();
    let lines = supervisor::command_lines(render_command.as_deref(), sidecar_commands.as_deref());

    let mut config = Config::new();
    config
        .user(&env::var("PG_USERNAME")?)
        .password(env::var("PG_PASSWORD")?)
        .host(&env::var("PG_HOSTNAME")?)
        .dbname(&env::var("PG_DATABASE")?)
        .port(var_or("PG_PORT", 5432)?);

    let runtime = Runtime::new()?;
    runtime.block_on(async move {
        let sidecars = supervisor::Sidecars::spawn(lines, sidecar_delay).await?;

        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                log::error!("database connection closed: {err}");
            }
        });

        let renderer = Renderer::new(render_url, render_timeout);
        let bot = Arc::new(Bot::new(Database::from(client), app, token, public, renderer));

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(addr).await?;
        log::info!("interaction server listening on {addr}");

        let mut stop = core::pin::pin!(tokio::signal::ctrl_c());
        loop {
            let (stream, peer) = tokio::select! {
                biased;
                result = &mut stop => {
                    result?;
                    break;
                }
                conn = listener.accept() => conn?,
            };

            let bot = bot.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let bot = bot.clone();
                    async move {
                        let res = bot.try_respond(req).await.unwrap_or_else(|code| {
                            let mut res = Response::new(Full::default());
                            *res.status_mut() = code;
                            res
                        });
                        Ok::<_, Infallible>(res)
                    }
                });
                if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                    log::error!("connection with {peer} failed: {err}");
                }
            });
        }

        log::info!("shutting down interaction server");
        sidecars.shutdown().await;
        anyhow::Ok(())
    })
}
