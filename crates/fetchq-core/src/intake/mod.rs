//! Response intake: header lines captured while a transfer streams in, and
//! the one-time status resolution that decides what the client is told.

mod header;
mod status;

pub(crate) use header::absorb_header;
pub(crate) use status::{resolve, Resolution, StatusInput};
