// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Backup engine: item actions and the breadth-first expansion that drives them

pub mod action;
pub mod actions;
pub mod archive;
pub mod error;
pub mod identifier;
pub mod item;
pub mod processor;
pub mod request;
pub mod selector;
pub mod source;

pub use archive::DirectoryArchive;
pub use error::{ErrorList, FetchError};
pub use identifier::{GroupResource, ResourceIdentifier};
pub use item::Item;
pub use processor::{BackupProcessor, BackupResult, BackupStatus, CancellationFlag};
pub use request::BackupRequest;
pub use selector::LabelSelector;
pub use source::ItemSource;
