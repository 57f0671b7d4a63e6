use std::collections::BTreeMap;

/// Fallback source consulted when a reference is not defined in the file
/// being expanded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostEnv {
    vars: BTreeMap<String, String>,
}

impl HostEnv {
    /// Snapshot the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are left out, so a
    /// reference to them stays unresolved.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| {
                let name = key.to_string_lossy().into_owned();
                match (key.into_string(), value.into_string()) {
                    (Ok(key), Ok(value)) => Some((key, value)),
                    _ => {
                        tracing::debug!(%name, "ignoring host variable that is not valid UTF-8");
                        None
                    }
                }
            })
            .collect();
        Self { vars }
    }

    /// An empty environment: nothing outside the file resolves.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for HostEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
