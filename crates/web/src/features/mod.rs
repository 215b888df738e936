pub mod admin;
pub mod competitions;
pub mod entries;
pub mod live;
pub mod payments;
pub mod performances;
pub mod scoring;
