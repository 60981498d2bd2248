//! The contract shared by client and server.
//!
//! Both processes compile against these definitions: the descriptors say
//! what each operation accepts and returns, and the error shapes say how
//! a well-behaved server reports failure.

pub mod errors;
pub mod users;
