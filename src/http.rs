//! Transport primitives shared by the token fetcher and the request transport.
//!
//! [`ResponseMetadata`] is captured from every HTTP round-trip and travels with both success
//! ([`ApiResponse`]) and failure ([`crate::error::ApiError`]) values, so callers can always
//! inspect status and headers; honoring `Retry-After` after a 429 is often the only way to
//! make an informed backoff decision.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, when a response was received.
	pub status: Option<u16>,
	/// Response headers; empty when no response was received.
	pub headers: HeaderMap,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Wall-clock time spent on the round-trip.
	pub elapsed: StdDuration,
}
impl ResponseMetadata {
	/// Captures status, headers, and retry hints from a live response.
	pub(crate) fn capture(response: &reqwest::Response, elapsed: StdDuration) -> Self {
		let headers = response.headers().to_owned();
		let retry_after = parse_retry_after(&headers);

		Self { status: Some(response.status().as_u16()), headers, retry_after, elapsed }
	}

	/// Metadata for a call that never produced a response (network-level failure).
	pub(crate) fn unanswered(elapsed: StdDuration) -> Self {
		Self { elapsed, ..Self::default() }
	}
}

/// Successful response surface returned by the transport.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Metadata captured from the HTTP response.
	pub metadata: ResponseMetadata,
	/// Raw response body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Decodes the body as JSON into `T`, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}

	/// Returns the body as UTF-8 text, lossily.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Builds the default reqwest client honoring the configured timeout and user agent.
///
/// Redirects are disabled: neither the token endpoint nor the API endpoints are expected to
/// delegate to another URI, and following one with a bearer header attached would leak it.
pub(crate) fn default_http_client(
	timeout: StdDuration,
	user_agent: &str,
) -> Result<ReqwestClient, ConfigError> {
	ReqwestClient::builder()
		.user_agent(user_agent)
		.timeout(timeout)
		.redirect(reqwest::redirect::Policy::none())
		.build()
		.map_err(|source| ConfigError::HttpClientBuild { source })
}

/// Parses `Retry-After` as integer seconds or an RFC 2822 HTTP date.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).ok()?));
	}

	let moment = OffsetDateTime::parse(raw, &Rfc2822).ok()?;
	let delta = moment - OffsetDateTime::now_utc();

	delta.is_positive().then_some(delta)
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	fn headers_with_retry_after(value: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();

		headers.insert(
			RETRY_AFTER,
			HeaderValue::from_str(value).expect("Retry-After fixture should be a valid header."),
		);

		headers
	}

	#[test]
	fn retry_after_parses_integer_seconds() {
		let headers = headers_with_retry_after("120");

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(120)));
	}

	#[test]
	fn retry_after_parses_future_http_dates() {
		let future = OffsetDateTime::now_utc() + Duration::minutes(5);
		let rendered = future
			.format(&Rfc2822)
			.expect("Future instant should format as an RFC 2822 date.");
		let headers = headers_with_retry_after(&rendered);
		let parsed = parse_retry_after(&headers).expect("A future date should yield a delay.");

		assert!(parsed > Duration::minutes(4));
		assert!(parsed <= Duration::minutes(5));
	}

	#[test]
	fn retry_after_ignores_garbage_and_past_dates() {
		assert_eq!(parse_retry_after(&headers_with_retry_after("soon")), None);

		let past = OffsetDateTime::now_utc() - Duration::minutes(5);
		let rendered =
			past.format(&Rfc2822).expect("Past instant should format as an RFC 2822 date.");

		assert_eq!(parse_retry_after(&headers_with_retry_after(&rendered)), None);
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
	}

	#[test]
	fn response_json_reports_the_failing_path() {
		#[derive(Debug, serde::Deserialize)]
		struct Payload {
			#[allow(dead_code)]
			count: u32,
		}

		let response = ApiResponse {
			metadata: ResponseMetadata::default(),
			body: br#"{"count":"many"}"#.to_vec(),
		};
		let err = response.json::<Payload>().expect_err("Type mismatch should fail to decode.");

		assert_eq!(err.path().to_string(), "count");
	}
}
