//! Decoding of valgrind-style memory traces:
//!
//! ```text
//! I 0400d7d4,8
//!  M 0421c7f0,4
//!  L 04f6b868,8
//! ```

use nom::{
    character::complete::{char, digit1, hex_digit1, one_of, space0},
    combinator::{all_consuming, map_res},
    IResult,
};
use thiserror::Error;

use crate::common::{AccessKind, TraceRecord};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TraceError {
    #[error("malformed trace record at line {line}: `{content}`")]
    Malformed { line: usize, content: String },
}

fn access_kind(input: &str) -> IResult<&str, AccessKind> {
    map_res(one_of("ILSM"), |c| AccessKind::try_from(c as u8))(input)
}

fn record(input: &str) -> IResult<&str, TraceRecord> {
    let (input, _) = space0(input)?;
    let (input, kind) = access_kind(input)?;
    let (input, _) = space0(input)?;
    let (input, addr) = map_res(hex_digit1, |h| u64::from_str_radix(h, 16))(input)?;
    let (input, _) = char(',')(input)?;
    let (input, size) = map_res(digit1, str::parse::<u32>)(input)?;
    let (input, _) = space0(input)?;
    Ok((input, TraceRecord::new(kind, addr, size)))
}

/// decodes every non-blank line of `trace`, keeping instruction fetches.
pub fn parse_trace(trace: &str) -> Result<Vec<TraceRecord>, TraceError> {
    let records = trace
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            all_consuming(record)(l)
                .map(|(_, r)| r)
                .map_err(|_| TraceError::Malformed {
                    line: i + 1,
                    content: l.to_owned(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("decoded {} trace records", records.len());
    Ok(records)
}
