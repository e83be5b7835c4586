mod add_tests;
mod common;
mod info_tests;
