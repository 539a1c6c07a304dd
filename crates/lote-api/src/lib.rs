pub mod auth;
pub mod dispatch;
pub mod error;
pub mod lotes;
pub mod middleware;
pub mod notifier;
pub mod pages;
pub mod router;
pub mod session;
pub mod state;

#[cfg(test)]
mod test_helpers;
