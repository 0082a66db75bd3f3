// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod cortex;
pub mod document;
pub mod orchestration;
pub mod transport;
