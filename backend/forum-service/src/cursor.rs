//! Opaque page-boundary tokens
//!
//! A cursor is the sort key and id of the last post on a page, joined as
//! `"value|id"` and encoded with URL-safe base64 (no padding). Time keys use
//! RFC 3339 with nanoseconds so decoding restores the exact instant.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{AppError, Result};
use crate::models::{PostId, PostRatingCursor, PostTimeCursor};

const SEPARATOR: char = '|';

/// Encoding strategy for post cursors
pub struct CursorCodec;

impl CursorCodec {
    pub fn encode_time(cursor: &PostTimeCursor) -> String {
        encode_parts(
            &cursor.time.to_rfc3339_opts(SecondsFormat::Nanos, true),
            cursor.id,
        )
    }

    pub fn decode_time(token: &str) -> Result<PostTimeCursor> {
        let (value, id) = decode_parts(token)?;
        let time = DateTime::parse_from_rfc3339(&value)
            .map_err(|_| AppError::InvalidCursor)?
            .with_timezone(&Utc);
        Ok(PostTimeCursor { time, id })
    }

    pub fn encode_rating(cursor: &PostRatingCursor) -> String {
        encode_parts(&cursor.rating.to_string(), cursor.id)
    }

    pub fn decode_rating(token: &str) -> Result<PostRatingCursor> {
        let (value, id) = decode_parts(token)?;
        let rating = value.parse::<i32>().map_err(|_| AppError::InvalidCursor)?;
        Ok(PostRatingCursor { rating, id })
    }
}

fn encode_parts(value: &str, id: PostId) -> String {
    URL_SAFE_NO_PAD.encode(format!("{value}{SEPARATOR}{id}"))
}

fn decode_parts(token: &str) -> Result<(String, PostId)> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| AppError::InvalidCursor)?;
    let raw = String::from_utf8(bytes).map_err(|_| AppError::InvalidCursor)?;

    let parts: Vec<&str> = raw.split(SEPARATOR).collect();
    if parts.len() != 2 {
        return Err(AppError::InvalidCursor);
    }

    let id = parts[1]
        .parse::<PostId>()
        .map_err(|_| AppError::InvalidCursor)?;
    Ok((parts[0].to_string(), id))
}
