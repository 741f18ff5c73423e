//! Authentication: token issuance/verification and header parsing.

pub mod jwt;
