use crate::{
    markup,
    pool::{BrowserPool, Launcher},
};
use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Body, Bytes},
    header::{HeaderValue, CONTENT_TYPE},
    Method, Request, Response, StatusCode,
};
use model::render::RenderRequest;

pub type Reply = Response<Full<Bytes>>;

async fn try_respond<L, B>(pool: &BrowserPool<L>, req: Request<B>) -> Result<Reply, StatusCode>
where
    L: Launcher,
    B: Body,
{
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => return Ok(Response::new(Full::default())),
        (&Method::POST, "/render") => (),
        (_, "/health" | "/render") => return Err(StatusCode::METHOD_NOT_ALLOWED),
        _ => return Err(StatusCode::NOT_FOUND),
    }

    let payload = req.into_body().collect().await.map_err(|_| StatusCode::BAD_REQUEST)?.to_bytes();
    let request: RenderRequest = serde_json::from_slice(&payload).map_err(|err| {
        log::warn!("rejected malformed render request: {err}");
        StatusCode::BAD_REQUEST
    })?;
    drop(payload);

    let html = markup::document(&request);
    let png = pool.render(&html).await.map_err(|err| {
        log::error!("render of poll {:?} failed: {err}", request.title);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let mut res = Response::new(Full::new(Bytes::from(png)));
    res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
    Ok(res)
}

/// Serves one request against the pool. Every failure becomes an empty response with its status code.
pub async fn respond<L, B>(pool: &BrowserPool<L>, req: Request<B>) -> Reply
where
    L: Launcher,
    B: Body,
{
    try_respond(pool, req).await.unwrap_or_else(|code| {
        let mut res = Response::new(Full::default());
        *res.status_mut() = code;
        res
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{Error, Result},
        pool::Engine,
    };

    struct Echo;

    impl Engine for Echo {
        async fn capture(&self, html: &str) -> Result<Vec<u8>> {
            if html.contains("explode") {
                return Err(Error::Capture);
            }
            Ok(b"\x89PNG".to_vec())
        }

        async fn shutdown(self) {}
    }

    struct EchoLauncher;

    impl Launcher for EchoLauncher {
        type Engine = Echo;

        async fn launch(&self) -> Result<Echo> {
            Ok(Echo)
        }
    }

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        let mut req = Request::new(Full::new(Bytes::from(body.to_owned())));
        *req.method_mut() = method;
        *req.uri_mut() = path.parse().unwrap();
        req
    }

    const BODY: &str = r#"{"title":"T","options":["a","b"],"counts":[1,2],"total":3,"creator":"c","closed":true,"locale":"en"}"#;

    #[tokio::test(flavor = "current_thread")]
    async fn renders_png() {
        let pool = BrowserPool::launch(EchoLauncher, 10).await.unwrap();
        let res = respond(&pool, request(Method::POST, "/render", BODY)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "image/png");
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"\x89PNG");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn maps_failures_to_status_codes() {
        let pool = BrowserPool::launch(EchoLauncher, 10).await.unwrap();
        let health = respond(&pool, request(Method::GET, "/health", "")).await;
        assert_eq!(health.status(), StatusCode::OK);

        let cases = [
            (Method::POST, "/render", "{not json", StatusCode::BAD_REQUEST),
            (Method::GET, "/render", "", StatusCode::METHOD_NOT_ALLOWED),
            (Method::POST, "/elsewhere", BODY, StatusCode::NOT_FOUND),
            (
                Method::POST,
                "/render",
                r#"{"title":"explode","options":[],"total":0,"creator":"c","closed":false,"locale":"en"}"#,
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (method, path, body, status) in cases {
            assert_eq!(respond(&pool, request(method, path, body)).await.status(), status, "{path} {body}");
        }
    }
}
