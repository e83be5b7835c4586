mod common;
mod pipeline_tests;
mod ssr_tests;
