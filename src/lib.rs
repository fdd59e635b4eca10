//! Salesforce REST client: authenticate with the OAuth password grant, reuse one cached bearer
//! token, and drive sObject CRUD, SOQL queries, and composite batches through a single
//! authenticated fetch helper.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod composite;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod query;
pub mod sobjects;

pub use client::SalesforceClient;
pub use config::ClientConfig;
pub use error::{Error, Result};

/// Loosely typed sObject record as returned by the REST API.
pub type Record = serde_json::Map<String, serde_json::Value>;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError, Method, StatusCode};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::{
		Record,
		error::{Error, Result},
	};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
