//! Handler resolution contract.
//!
//! The dispatcher does not own handler registration. It consumes two
//! capabilities from whatever container the host application uses: resolve
//! exactly one instance of a contract, and resolve every instance of a
//! contract. Contracts are identified by the `TypeId` of the contract type,
//! typically a trait object such as `dyn CommandHandler<PlaceOrder>`.

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use crate::error::{MediatorError, MediatorResult};

/// A resolved instance. For a contract `T` the instance is an `Arc<T>`
/// stored behind `dyn Any`.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Source of handler instances, keyed by contract type.
pub trait HandlerResolver: Send + Sync {
    /// Resolves the single implementation of `contract`, if any.
    ///
    /// `contract_name` is the contract's type name, for diagnostics.
    fn resolve_one(&self, contract: TypeId, contract_name: &'static str) -> Option<Instance>;

    /// Resolves every implementation of `contract` in registration order.
    /// An empty result is valid.
    fn resolve_all(&self, contract: TypeId, contract_name: &'static str) -> Vec<Instance>;
}

/// Wraps a contract implementation as a resolver instance.
pub fn instance<T>(value: Arc<T>) -> Instance
where
    T: ?Sized + Send + Sync + 'static,
{
    Arc::new(value)
}

/// Recovers the `Arc<T>` stored in a resolver instance, if it holds one.
#[must_use]
pub fn downcast_instance<T>(instance: &Instance) -> Option<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    instance.downcast_ref::<Arc<T>>().cloned()
}

/// Resolves exactly one implementation of `T`.
///
/// # Errors
///
/// Returns `MediatorError::HandlerNotRegistered` when nothing is registered
/// and `MediatorError::ContractMismatch` when the resolver returns something
/// other than an `Arc<T>`.
pub fn resolve_one<T>(resolver: &dyn HandlerResolver) -> MediatorResult<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    let contract = type_name::<T>();
    let instance = resolver
        .resolve_one(TypeId::of::<T>(), contract)
        .ok_or(MediatorError::HandlerNotRegistered { contract })?;
    downcast_instance::<T>(&instance).ok_or(MediatorError::ContractMismatch { contract })
}

/// Resolves every implementation of `T`, in registration order.
///
/// Instances of the wrong shape are skipped and logged.
pub fn resolve_all<T>(resolver: &dyn HandlerResolver) -> Vec<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    let contract = type_name::<T>();
    resolver
        .resolve_all(TypeId::of::<T>(), contract)
        .iter()
        .filter_map(|instance| {
            let resolved = downcast_instance::<T>(instance);
            if resolved.is_none() {
                tracing::warn!(contract, "skipping resolved instance of the wrong type");
            }
            resolved
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    /// Resolver that always returns the same raw instance list.
    struct Fixed(Vec<Instance>);

    impl HandlerResolver for Fixed {
        fn resolve_one(&self, _contract: TypeId, _name: &'static str) -> Option<Instance> {
            self.0.last().cloned()
        }

        fn resolve_all(&self, _contract: TypeId, _name: &'static str) -> Vec<Instance> {
            self.0.clone()
        }
    }

    #[test]
    fn test_resolve_one_unwraps_trait_object() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let resolver = Fixed(vec![instance(greeter)]);

        let resolved = resolve_one::<dyn Greeter>(&resolver).unwrap();

        assert_eq!(resolved.greet(), "hello");
    }

    #[test]
    fn test_resolve_one_reports_missing_contract() {
        let resolver = Fixed(Vec::new());

        let result = resolve_one::<dyn Greeter>(&resolver);

        assert!(matches!(
            result,
            Err(MediatorError::HandlerNotRegistered { contract }) if contract.contains("Greeter")
        ));
    }

    #[test]
    fn test_resolve_one_reports_wrong_shape() {
        let raw: Instance = Arc::new(42_u32);
        let resolver = Fixed(vec![raw]);

        let result = resolve_one::<dyn Greeter>(&resolver);

        assert!(matches!(result, Err(MediatorError::ContractMismatch { .. })));
    }

    #[test]
    fn test_resolve_all_skips_wrong_shape() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let noise: Instance = Arc::new("noise");
        let resolver = Fixed(vec![noise, instance(greeter)]);

        let resolved = resolve_all::<dyn Greeter>(&resolver);

        assert_eq!(resolved.len(), 1);
    }
}
