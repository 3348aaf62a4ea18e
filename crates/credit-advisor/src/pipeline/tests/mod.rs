mod common;
mod completeness;
mod scoring;
mod service;
