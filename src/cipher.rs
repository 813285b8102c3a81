// Copyright 2025 coScene
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

// Encryption layer selection
//
// Only `no-cipher` exists today. A real cipher would be appended as the
// outermost layer, above the codec.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WriterError;
use crate::layer::{LayerHandle, WriterLayer};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Cipher {
    #[default]
    #[serde(rename = "no-cipher")]
    NoCipher,
}

impl Cipher {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cipher::NoCipher => "no-cipher",
        }
    }

    /// Layer that encrypts into `downstream`, or `None` for the identity cipher
    pub fn wrap(
        &self,
        _downstream: LayerHandle,
    ) -> Result<Option<Box<dyn WriterLayer>>, WriterError> {
        match self {
            Cipher::NoCipher => Ok(None),
        }
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cipher {
    type Err = WriterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "no-cipher" | "none" => Ok(Cipher::NoCipher),
            _ => Err(WriterError::UnsupportedCipher(s.to_string())),
        }
    }
}
