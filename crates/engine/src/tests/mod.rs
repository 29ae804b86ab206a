mod helpers;
mod flusher_tests;
mod read_tests;
