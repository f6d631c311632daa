//! breva is a small community blogging server. Registered members publish
//! short posts, optionally filed under a group, comment on each other's
//! posts, and follow authors to build a personal feed. Listing pages are
//! paginated by page number and the front page sits behind a short-lived
//! response cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
