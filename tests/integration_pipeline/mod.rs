//! Pipeline coverage from widget source to rendered HTML.

mod isolation;
mod negative_execution;
mod widget_smoke;
