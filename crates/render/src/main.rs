use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use std::{
    convert::Infallible,
    env,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tally_render::{pool::BrowserPool, service, ChromiumLauncher};
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
    let port = var_or("PORT", 3001)?;
    let rotate_after = var_or("ROTATE_AFTER", 100)?;
    let width = var_or("RENDER_WIDTH", 1000)?;
    let height = var_or("RENDER_HEIGHT", 1000)?;
    let executable = env::var_os("CHROME_PATH").map(Into::into);

    let runtime = Runtime::new()?;
    runtime.block_on(async move {
        let launcher = ChromiumLauncher { executable, width, height };
        let pool = Arc::new(BrowserPool::launch(launcher, rotate_after).await?);

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr).await?;
        log::info!("render worker listening on {addr}");

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

            let pool = pool.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let pool = pool.clone();
                    async move { Ok::<_, Infallible>(service::respond(&pool, req).await) }
                });
                if let Err(err) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
                    log::error!("connection with {peer} failed: {err}");
                }
            });
        }

        log::info!("shutting down render worker");
        pool.shutdown().await;
        anyhow::Ok(())
    })
}
