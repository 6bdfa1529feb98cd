// Copyright 2026 tlsbridge developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The OpenSSL API surface used by tlsbridge.
//!
//! This crate re-exports the [openssl] modules the adaptation layer consumes
//! and provides the few raw helpers the safe API is missing in [`ext`].

#![warn(clippy::all)]

use openssl as ssl_lib;
pub use openssl_sys as ssl_sys;
pub mod ext;

// export commonly used libs
pub use ssl_lib::asn1;
pub use ssl_lib::error;
pub use ssl_lib::hash;
pub use ssl_lib::nid;
pub use ssl_lib::pkey;
pub use ssl_lib::rsa;
pub use ssl_lib::ssl;
pub use ssl_lib::symm;
pub use ssl_lib::x509;
