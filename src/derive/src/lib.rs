extern crate proc_macro;

use crate::proc_macro::TokenStream;

use quote::quote;

use syn::{parse_macro_input, DeriveInput};

/// Implements `KubeObject` for a struct with a `metadata: ObjectMeta` field.
#[proc_macro_derive(KubeObject)]
pub fn kube_object_derive(input: TokenStream) -> TokenStream {
  let input = parse_macro_input!(input as DeriveInput);
  let name = &input.ident;

  TokenStream::from(quote! {
    impl cluster_capacity::core::object::KubeObject for #name {
      fn metadata(&self) -> &cluster_capacity::core::common::ObjectMeta {
        &self.metadata
      }

      fn metadata_mut(&mut self) -> &mut cluster_capacity::core::common::ObjectMeta {
        &mut self.metadata
      }
    }
  })
}
