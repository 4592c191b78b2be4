use crate::error::{Error, Result};
use alloc::{string::String, vec::Vec};
use core::time::Duration;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Bytes,
    header::{HeaderValue, CONTENT_TYPE},
    Request, Uri,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use model::{
    render::{Mode, RenderRequest},
    Poll, Tally,
};

/// Client of the out-of-process render worker.
pub struct Renderer {
    client: Client<HttpConnector, Full<Bytes>>,
    url: Uri,
    timeout: Duration,
}

impl Renderer {
    pub fn new(url: Uri, timeout: Duration) -> Self {
        Self { client: Client::builder(TokioExecutor::new()).build_http(), url, timeout }
    }

    /// Renders `request` into a PNG. A worker that does not answer within the timeout counts as failed.
    pub async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(request).map_err(|err| {
            log::error!("failed to serialize render request: {err}");
            Error::Render
        })?;

        let mut req = Request::post(self.url.clone()).body(Full::new(Bytes::from(body))).map_err(|err| {
            log::error!("failed to build render request: {err}");
            Error::Render
        })?;
        req.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let call = async {
            let res = self.client.request(req).await.map_err(|err| {
                log::error!("render worker is unreachable: {err}");
                Error::Render
            })?;

            let status = res.status();
            if !status.is_success() {
                log::error!("render worker answered with {status}");
                return Err(Error::Render);
            }

            let png = res.into_body().collect().await.map_err(|err| {
                log::error!("failed to read rendered image: {err}");
                Error::Render
            })?;
            Ok(png.to_bytes().to_vec())
        };

        tokio::time::timeout(self.timeout, call).await.unwrap_or_else(|_| {
            log::error!("render worker did not answer within {:?}", self.timeout);
            Err(Error::Render)
        })
    }
}

/// Assembles the render input for one poll state. Hidden results carry neither counts nor a total.
pub fn request(
    poll: &Poll,
    labels: Vec<String>,
    creator: String,
    tally: Option<&Tally>,
    mode: Mode,
    locale: &str,
) -> RenderRequest {
    RenderRequest {
        title: poll.title.clone(),
        description: poll.description.clone(),
        options: labels,
        counts: tally.map(|tally| tally.counts.clone()),
        total: tally.map_or(0, |tally| tally.total),
        creator,
        closed: !poll.active,
        mode,
        locale: String::from(locale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Settings;

    fn poll(active: bool) -> Poll {
        Poll {
            id: 1,
            guild: 2,
            channel: 3,
            creator: 4,
            title: String::from("Drinks"),
            description: Some(String::from("Pick one")),
            options: Vec::from([String::from("Tea"), String::from("<@9>")]),
            active,
            created_at: Default::default(),
            settings: Settings::default(),
        }
    }

    #[test]
    fn hidden_results_omit_counts() {
        let labels = Vec::from([String::from("Tea"), String::from("@alice")]);
        let req = request(&poll(true), labels, String::from("Bob"), None, Mode::Card, "en-US");
        assert_eq!(req.counts, None);
        assert_eq!(req.total, 0);
        assert_eq!(req.options[1], "@alice");
        assert!(!req.closed);
    }

    #[test]
    fn closed_poll_carries_tally() {
        let tally = Tally::from_votes(2, [(0, 3), (1, 5)]);
        let labels = Vec::from([String::from("Tea"), String::from("Coffee")]);
        let req = request(&poll(false), labels, String::from("Bob"), Some(&tally), Mode::Detailed, "de");
        assert_eq!(req.counts.as_deref(), Some(&[3, 5][..]));
        assert_eq!(req.total, 8);
        assert!(req.closed);
        assert_eq!(req.mode, Mode::Detailed);
        assert_eq!(req.locale, "de");
    }
}
