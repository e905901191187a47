//! Job lifecycle coverage over HTTP and, with the `test_support` feature,
//! over the scripted service.

mod http_lifecycle;
#[cfg(feature = "test_support")]
mod scripted_dashboard;
