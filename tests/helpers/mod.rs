#![allow(dead_code)]

mod mock_upstream;

pub use mock_upstream::{ANSWER_V4, Behavior, MockUpstream, ask, closed_port};
