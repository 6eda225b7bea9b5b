use proc_macro::TokenStream;

mod constructor;
mod properties;

/// Registers a free function as a named constructor in the
/// `udbc_provision::factory` registry before `main` runs.
///
/// ```ignore
/// #[constructor("acme.PgDataSource")]
/// fn pg_data_source() -> Box<dyn DataSource> {
///     Box::new(PgDataSource::default())
/// }
/// ```
///
/// Parameter types form the constructor signature. A `Result<T, E>` return
/// type registers a constructor producing `T` whose `E` surfaces as a
/// construction failure.
#[proc_macro_attribute]
pub fn constructor(attr: TokenStream, item: TokenStream) -> TokenStream {
    constructor::constructor_impl(attr, item)
}

/// Implements `udbc_provision::properties::Properties` by matching property
/// names against field names and their camelCase form.
///
/// Field attributes: `#[property(skip)]`, `#[property(rename = "name")]`.
#[proc_macro_derive(Properties, attributes(property))]
pub fn derive_properties(input: TokenStream) -> TokenStream {
    properties::derive_properties_impl(input)
}
