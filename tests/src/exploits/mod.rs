//! # Exploit Simulations
//!
//! A dishonest maker or resolver trying to take funds from the other side.
//!
//! | Attack | Defense |
//! |--------|---------|
//! | Guess or replay a secret | SHA-256 hashlock, constant-time compare |
//! | Swap the secret after reveal | First accepted secret is final |
//! | Reveal after the counterparty can no longer withdraw | Late reveal goes to recovery |
//! | Destination escrow outliving source | Asymmetric timelocks checked at intake |
//! | Resolver never funds | Recovery refunds the maker |

pub mod hashlock_attacks;
