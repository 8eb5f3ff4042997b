//! Bridge domains.

mod cmds;
mod entity;
mod listener;

pub use cmds::{dump_cmd, CreateCmd, DeleteCmd};
pub use entity::BridgeDomain;
pub use listener::BridgeDomainListener;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::install;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use vom_api::{Request, RetVal, DEFAULT_BRIDGE_DOMAIN};
    use vom_core::{hw, Listener, Om, ResultCode};

    fn add(bd_id: u32, learn: bool) -> Request {
        Request::BridgeDomainAddDel {
            bd_id,
            is_add: true,
            learn,
        }
    }

    fn del(bd_id: u32) -> Request {
        Request::BridgeDomainAddDel {
            bd_id,
            is_add: false,
            learn: false,
        }
    }

    #[test]
    #[serial]
    fn test_create_once_delete_on_last_release() {
        let engine = install();
        assert_eq!(Om::write("bd-a", &BridgeDomain::new(33)), ResultCode::Ok);
        assert_eq!(Om::write("bd-b", &BridgeDomain::new(33)), ResultCode::Ok);
        assert_eq!(engine.mutations(), vec![add(33, true)]);

        engine.clear_requests();
        Om::remove("bd-a");
        assert!(engine.mutations().is_empty());
        Om::remove("bd-b");
        assert_eq!(engine.mutations(), vec![del(33)]);
        assert!(engine.bridge_domain(33).is_none());
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_learning_change_is_pushed() {
        let engine = install();
        Om::write("bd-a", &BridgeDomain::new(34));
        engine.clear_requests();

        Om::write("bd-a", &BridgeDomain::with_learning(34, false));
        assert_eq!(engine.mutations(), vec![add(34, false)]);
        assert_eq!(engine.bridge_domain(34).map(|bd| bd.learn), Some(false));
        Om::remove("bd-a");
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_existing_domain_is_adopted() {
        let engine = install();
        engine.seed_bridge_domain(35, true, &[]);
        assert_eq!(Om::write("bd-a", &BridgeDomain::new(35)), ResultCode::Ok);
        assert!(BridgeDomain::find(35).unwrap().is_configured());
        Om::remove("bd-a");
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_default_domain_is_rejected() {
        let engine = install();
        let rc = Om::write("bd-a", &BridgeDomain::new(DEFAULT_BRIDGE_DOMAIN));
        assert_eq!(rc, ResultCode::Invalid);
        assert_eq!(
            engine.bridge_domain(DEFAULT_BRIDGE_DOMAIN).map(|bd| bd.bd_id),
            Some(DEFAULT_BRIDGE_DOMAIN)
        );
        engine.clear_requests();
        Om::remove("bd-a");
        assert!(engine.mutations().is_empty());
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_failed_create_retried() {
        let engine = install();
        engine.inject_fault("bridge_domain_add_del", RetVal::Unspecified);
        assert_eq!(Om::write("bd-a", &BridgeDomain::new(36)), ResultCode::Invalid);
        assert!(engine.bridge_domain(36).is_none());

        assert_eq!(Om::write("bd-a", &BridgeDomain::new(36)), ResultCode::Ok);
        assert!(engine.bridge_domain(36).is_some());
        Om::remove("bd-a");
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_populate_skips_default() {
        let engine = install();
        engine.seed_bridge_domain(37, false, &[]);
        hw::disable();
        BridgeDomainListener.handle_populate("bd-boot");
        hw::enable();

        assert!(engine.mutations().is_empty());
        assert_eq!(Om::claims("bd-boot"), 1);
        let bd = BridgeDomain::find(37).unwrap();
        assert!(bd.is_configured());
        assert!(!bd.learn());
        assert!(BridgeDomain::find(DEFAULT_BRIDGE_DOMAIN).is_none());
        drop(bd);

        Om::remove("bd-boot");
        assert_eq!(engine.mutations(), vec![del(37)]);
        hw::shutdown();
    }
}
