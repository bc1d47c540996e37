// SPDX-License-Identifier: AGPL-3.0-only
pub mod common;
pub mod config;
pub mod liquidity;
pub mod swap;
pub mod token;
