//! Request body buffering.
//!
//! Bodies are read exactly once per request, before the chain starts:
//!
//! | `Content-Type` | Result |
//! |---|---|
//! | `multipart/form-data; boundary=…` | collected up to the multipart cap, parsed into a [`MultipartForm`] |
//! | `application/x-www-form-urlencoded` | buffered as raw bytes **and** parsed into form values |
//! | anything else, or absent | buffered as raw bytes |
//!
//! Query-string pairs are always added to the form values.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap};
use http::Uri;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;

use crate::error::{BodyError, BoxError};
use crate::handler::BoxFuture;
use crate::multipart::{self, MultipartForm};

/// Type-erased request body held by a [`Context`](crate::Context) until parsed.
pub(crate) type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// Default cap on a buffered `multipart/form-data` body: 5 MiB.
pub const DEFAULT_MAX_MULTIPART_BYTES: usize = 5 << 20;

pub(crate) fn boxed<B>(body: B) -> RequestBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

pub(crate) enum ParsedBody {
    Raw { bytes: Bytes, form: Vec<(String, String)> },
    Multipart(MultipartForm),
}

/// Reads and classifies `body` according to the request's `Content-Type`.
pub(crate) async fn read(
    headers: &HeaderMap,
    body: RequestBody,
    max_multipart_bytes: usize,
) -> Result<ParsedBody, BodyError> {
    let media = match headers.get(CONTENT_TYPE) {
        Some(v) if !v.is_empty() => Some(String::from_utf8_lossy(v.as_bytes()).parse::<mime::Mime>()?),
        _ => None,
    };

    if let Some(media) = &media {
        if media.type_() == mime::MULTIPART && media.subtype() == mime::FORM_DATA {
            let boundary = media
                .get_param(mime::BOUNDARY)
                .ok_or(BodyError::MissingBoundary)?
                .as_str()
                .to_owned();
            let bytes = collect_limited(body, max_multipart_bytes).await?;
            return Ok(ParsedBody::Multipart(multipart::parse(&bytes, &boundary)?));
        }
    }

    let bytes = body.collect().await.map_err(BodyError::Read)?.to_bytes();

    let mut form = Vec::new();
    if media.as_ref().is_some_and(|m| m.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str()) {
        form.extend(form_urlencoded::parse(&bytes).into_owned());
    }

    Ok(ParsedBody::Raw { bytes, form })
}

/// Query-string pairs, in order.
pub(crate) fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

async fn collect_limited(body: RequestBody, limit: usize) -> Result<Bytes, BodyError> {
    let collect: BoxFuture<'static, _> = Box::pin(Limited::new(body, limit).collect());
    match collect.await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(BodyError::TooLarge { limit }),
        Err(e) => Err(BodyError::Read(e)),
    }
}

/// Reads whatever is left of a body, for logging. Read errors yield what was
/// collected so far: nothing.
pub(crate) async fn drain(body: RequestBody) -> Bytes {
    body.collect().await.map(|c| c.to_bytes()).unwrap_or_default()
}
