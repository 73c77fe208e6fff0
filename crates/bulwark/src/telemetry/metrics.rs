// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::metrics::{Counter, Meter, MeterProvider};
use opentelemetry::{InstrumentationScope, KeyValue};

use super::AttributeValue;

const METER_NAME: &str = "bulwark";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

pub(crate) fn create_resilience_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("resilience.event")
        .with_description("Emitted upon the occurrence of a resilience event.")
        .with_unit("{event}")
        .build()
}

/// Converts a strategy attribute into a metric dimension.
///
/// Durations are left out to keep the dimension cardinality bounded.
pub(crate) fn to_key_value(key: &'static str, value: &AttributeValue) -> Option<KeyValue> {
    match value {
        AttributeValue::Bool(flag) => Some(KeyValue::new(key, *flag)),
        AttributeValue::I64(number) => Some(KeyValue::new(key, *number)),
        AttributeValue::Str(text) => Some(KeyValue::new(key, text.to_string())),
        AttributeValue::Duration(_) => None,
    }
}
