use std::collections::BTreeMap;

use crate::context::{FieldDescriptor, PathLink, RequestContext};

pub const LABEL_OPERATION_NAME: &str = "operationName";
pub const LABEL_OPERATION: &str = "operation";
pub const LABEL_APP: &str = "app";
pub const LABEL_SERVICE: &str = "service";
pub const LABEL_FIELD_NAME: &str = "fieldName";
pub const LABEL_PARENT_TYPE: &str = "parentType";
pub const LABEL_PATH_LENGTH: &str = "pathLength";
pub const LABEL_RETURN_TYPE: &str = "returnType";
pub const LABEL_SUCCESS: &str = "success";
pub const LABEL_VERSION: &str = "version";

/// Header carrying the name of the calling application.
pub const APP_HEADER: &str = "app";

/// Labels of a candidate recording, some of which may be absent.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct LabelSet(BTreeMap<&'static str, Option<String>>);

impl LabelSet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, key: &'static str, value: Option<String>) {
        self.0.insert(key, value);
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.insert(key, Some(value.into()));
        self
    }

    /// Merge `other` into this set, values of `other` win.
    pub fn merge(mut self, other: LabelSet) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Returns `None` if the key is missing and `Some(None)` if it is absent.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.0.get(key).map(|value| value.as_deref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Labels with every value present.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Labels(BTreeMap<&'static str, String>);

impl Labels {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.0.iter().map(|(key, value)| (*key, value.as_str()))
    }

    pub fn to_metric_labels(&self) -> Vec<metrics::Label> {
        self.iter()
            .map(|(key, value)| metrics::Label::new(key, value.to_string()))
            .collect()
    }
}

/// Remove every label whose value is absent.
pub fn filter_labels(labels: LabelSet) -> Labels {
    Labels(
        labels
            .0
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect(),
    )
}

pub fn labels_from_context(ctx: &dyn RequestContext, service: &str) -> LabelSet {
    let mut labels = LabelSet::new();
    labels.insert(
        LABEL_OPERATION_NAME,
        ctx.operation_name().map(ToString::to_string),
    );
    labels.insert(
        LABEL_OPERATION,
        ctx.operation().map(|operation| operation.to_string()),
    );
    labels.insert(LABEL_APP, ctx.header(APP_HEADER).map(ToString::to_string));
    labels.insert(LABEL_SERVICE, Some(service.to_string()));
    labels
}

pub fn labels_from_field(field: &dyn FieldDescriptor) -> LabelSet {
    LabelSet::new()
        .with(LABEL_FIELD_NAME, field.field_name())
        .with(LABEL_PARENT_TYPE, field.parent_type())
        .with(LABEL_PATH_LENGTH, count_field_ancestors(field.path()))
        .with(LABEL_RETURN_TYPE, field.return_type())
}

/// Number of links in the path, walking towards the root.
pub fn count_field_ancestors(mut path: Option<&dyn PathLink>) -> String {
    let mut counter = 0usize;
    while let Some(link) = path {
        path = link.prev();
        counter += 1;
    }
    counter.to_string()
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, HeaderValue};

    use super::*;
    use crate::context::{OperationContext, OperationKind, ResolvedField, ResponsePath};

    #[test]
    fn filter_removes_absent_values() {
        let mut labels = LabelSet::new().with("a", "1").with(LABEL_SUCCESS, "false");
        labels.insert("b", None);
        labels.insert("c", Some(String::new()));

        let filtered = filter_labels(labels);
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered.get("a"), Some("1"));
        assert_eq!(filtered.get(LABEL_SUCCESS), Some("false"));
        assert_eq!(filtered.get("c"), Some(""));
        assert_eq!(filtered.get("b"), None);
    }

    #[test]
    fn metric_labels_follow_key_order() {
        let labels = filter_labels(
            LabelSet::new()
                .with(LABEL_SERVICE, "accounts")
                .with(LABEL_APP, "web")
                .with(LABEL_OPERATION_NAME, "GetUser"),
        );
        let metric_labels: Vec<_> = labels
            .to_metric_labels()
            .into_iter()
            .map(|label| (label.key().to_string(), label.value().to_string()))
            .collect();
        assert_eq!(
            metric_labels,
            vec![
                ("app".to_string(), "web".to_string()),
                ("operationName".to_string(), "GetUser".to_string()),
                ("service".to_string(), "accounts".to_string()),
            ]
        );
    }

    #[test]
    fn filter_empty() {
        assert!(filter_labels(LabelSet::new()).is_empty());
    }

    #[test]
    fn merge_prefers_right_hand_side() {
        let labels = LabelSet::new()
            .with("a", "1")
            .with("b", "2")
            .merge(LabelSet::new().with("b", "3"));
        assert_eq!(labels.get("a"), Some(Some("1")));
        assert_eq!(labels.get("b"), Some(Some("3")));
    }

    #[test]
    fn context_labels() {
        let mut headers = HeaderMap::new();
        headers.insert(APP_HEADER, HeaderValue::from_static("mobile"));
        let ctx = OperationContext::default()
            .with_operation_name("GetUser")
            .with_operation(OperationKind::Query)
            .with_headers(headers);

        let labels = labels_from_context(&ctx, "accounts");
        assert_eq!(labels.get(LABEL_OPERATION_NAME), Some(Some("GetUser")));
        assert_eq!(labels.get(LABEL_OPERATION), Some(Some("query")));
        assert_eq!(labels.get(LABEL_APP), Some(Some("mobile")));
        assert_eq!(labels.get(LABEL_SERVICE), Some(Some("accounts")));
    }

    #[test]
    fn missing_context_values_are_absent() {
        let labels = labels_from_context(&OperationContext::default(), "accounts");
        assert_eq!(labels.len(), 4);
        assert_eq!(labels.get(LABEL_OPERATION_NAME), Some(None));
        assert_eq!(labels.get(LABEL_OPERATION), Some(None));
        assert_eq!(labels.get(LABEL_APP), Some(None));

        let filtered = filter_labels(labels);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get(LABEL_SERVICE), Some("accounts"));
    }

    #[test]
    fn count_ancestors() {
        assert_eq!(count_field_ancestors(None), "0");

        let root = ResponsePath::root("me");
        assert_eq!(count_field_ancestors(Some(&root)), "1");

        let nested = ResponsePath::root("users").child("0").child("name");
        assert_eq!(count_field_ancestors(Some(&nested)), "3");
    }

    #[test]
    fn field_labels() {
        let field = ResolvedField {
            field_name: "username".to_string(),
            parent_type: "User".to_string(),
            return_type: "String!".to_string(),
            path: Some(ResponsePath::root("me").child("username")),
        };

        let labels = filter_labels(labels_from_field(&field));
        assert_eq!(labels.get(LABEL_FIELD_NAME), Some("username"));
        assert_eq!(labels.get(LABEL_PARENT_TYPE), Some("User"));
        assert_eq!(labels.get(LABEL_PATH_LENGTH), Some("2"));
        assert_eq!(labels.get(LABEL_RETURN_TYPE), Some("String!"));
    }
}
