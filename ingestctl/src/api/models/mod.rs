//! API request and response data models.
//!
//! - [`uploads`]: query parameters for the upload endpoints and the upload metadata response

pub mod uploads;
