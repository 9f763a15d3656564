/// Configuration section macro
///
/// `config_struct!` declares a config section where each field carries its
/// default inline. It expands to:
/// - the struct with public fields
/// - `Default` built from the inline values
/// - serde derives with `#[serde(default)]`, so partial TOML files work
///
/// # Example
/// ```
/// statshub::config_struct! {
///     pub struct RetryConfig {
///         max_attempts: u32 = 3,
///         backoff_step_ms: u64 = 200,
///     }
/// }
///
/// let retry = RetryConfig::default();
/// assert_eq!(retry.max_attempts, 3);
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
