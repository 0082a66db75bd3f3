// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod engine;
pub mod intake;
pub mod package;
pub mod registry;
