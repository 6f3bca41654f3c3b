// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Logger installation. Filters follow `RUST_LOG`.

use anyhow::Context;
use env_logger::{Builder, Env};

fn builder(default_filter: &str) -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.format_timestamp_millis();
    builder
}

/// Installs the global logger. Panics if one is already installed.
pub fn init_logging(default_filter: &str) {
    builder(default_filter).init();
}

/// Installs the global logger unless one is already installed.
pub fn try_init_logging(default_filter: &str) -> anyhow::Result<()> {
    builder(default_filter)
        .try_init()
        .context("Failed to install the logger")
}
