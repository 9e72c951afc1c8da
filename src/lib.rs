// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Reader for the Apache ORC and DWRF columnar file formats, producing
//! Apache Arrow [`RecordBatch`](arrow::record_batch::RecordBatch)es.
//!
//! Start from [`ArrowReaderBuilder`] (or [`ArrowReaderBuilder::try_new_async`]
//! behind the `async` feature) to open a file and configure projection,
//! batch size and predicate pushdown before iterating over record batches.

mod array_decoder;
pub mod arrow_reader;
#[cfg(feature = "async")]
pub mod async_arrow_reader;
pub mod column;
pub mod compression;
pub mod encoding;
pub mod error;
pub mod metadata;
pub mod predicate;
pub mod projection;
pub mod proto;
pub mod reader;
pub mod row_group;
pub mod schema;
pub mod statistics;
pub mod stripe;

pub use arrow_reader::{ArrowReader, ArrowReaderBuilder};
#[cfg(feature = "async")]
pub use async_arrow_reader::ArrowStreamReader;
pub use error::{OrcError, Result};
