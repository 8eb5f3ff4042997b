//! Host and loopback interfaces.

mod cmds;
mod entity;
mod listener;
mod types;

pub use cmds::{
    dump_cmd, CreateCmd, DeleteCmd, EventsCmd, InterfaceEventListener, StateChangeCmd,
};
pub use entity::Interface;
pub use listener::InterfaceListener;
pub use types::AdminState;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::install;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use vom_api::{InterfaceHandle, Request, RetVal};
    use vom_core::{Entity, Listener, Om, ResultCode};

    fn set(index: u32, up: bool) -> Request {
        Request::SwInterfaceSetFlags {
            sw_if_index: InterfaceHandle::new(index),
            admin_up: up,
        }
    }

    #[test]
    #[serial]
    fn test_create_and_delete_af_packet() {
        let engine = install();
        let itf = Interface::af_packet("itf-basic", AdminState::Up);
        assert_eq!(Om::write("itf-owner", &itf), ResultCode::Ok);
        assert_eq!(
            engine.mutations(),
            vec![
                Request::AfPacketCreate {
                    host_if_name: "itf-basic".into()
                },
                set(1, true),
            ]
        );

        let canonical = Interface::find("itf-basic").unwrap();
        assert_eq!(canonical.handle(), InterfaceHandle::new(1));
        assert!(canonical.is_configured());
        drop(canonical);

        engine.clear_requests();
        Om::remove("itf-owner");
        assert_eq!(
            engine.mutations(),
            vec![
                set(1, false),
                Request::AfPacketDelete {
                    host_if_name: "itf-basic".into()
                },
            ]
        );
        assert!(Interface::find("itf-basic").is_none());
        vom_core::hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_state_change_only_sends_flags() {
        let engine = install();
        Om::write("itf-owner", &Interface::loopback("itf-lo", AdminState::Down));
        engine.clear_requests();

        Om::write("itf-owner", &Interface::loopback("itf-lo", AdminState::Up));
        assert_eq!(engine.mutations(), vec![set(1, true)]);

        engine.clear_requests();
        Om::remove("itf-owner");
        assert_eq!(
            engine.mutations(),
            vec![
                set(1, false),
                Request::DeleteLoopback {
                    sw_if_index: InterfaceHandle::new(1)
                },
            ]
        );
        vom_core::hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_existing_interface_is_adopted() {
        let engine = install();
        let existing = engine.seed_af_packet("itf-seeded", false);
        let rc = Om::write("itf-owner", &Interface::af_packet("itf-seeded", AdminState::Up));
        assert_eq!(rc, ResultCode::Ok);
        assert_eq!(
            Interface::find("itf-seeded").map(|i| i.handle()),
            Some(existing)
        );
        Om::remove("itf-owner");
        vom_core::hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_rejected_create_leaves_interface_unconfigured() {
        let engine = install();
        engine.inject_fault("af_packet_create", RetVal::InvalidInterface);
        let itf = Interface::af_packet("itf-bad", AdminState::Up);
        assert_eq!(Om::write("itf-owner", &itf), ResultCode::Invalid);
        let canonical = itf.singular();
        assert!(!canonical.is_configured());
        assert!(!canonical.handle().is_valid());
        drop(canonical);

        // no handle, nothing to tear down
        engine.clear_requests();
        Om::remove("itf-owner");
        assert!(engine.mutations().is_empty());
        vom_core::hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_find_by_handle() {
        let _engine = install();
        Om::write("itf-owner", &Interface::loopback("itf-a", AdminState::Down));
        Om::write("itf-owner", &Interface::loopback("itf-b", AdminState::Down));
        let b = Interface::find_by_handle(InterfaceHandle::new(2)).unwrap();
        assert_eq!(b.name(), "itf-b");
        assert!(Interface::find_by_handle(InterfaceHandle::new(9)).is_none());
        drop(b);
        Om::remove("itf-owner");
        vom_core::hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_name_of_follows_create_and_delete() {
        let _engine = install();
        Om::write("itf-owner", &Interface::loopback("itf-named", AdminState::Down));
        let handle = Interface::find("itf-named").unwrap().handle();
        assert_eq!(Interface::name_of(handle).as_deref(), Some("itf-named"));

        // resolving a name keeps nothing alive
        Om::remove("itf-owner");
        assert!(Interface::find("itf-named").is_none());
        assert_eq!(Interface::name_of(handle), None);
        vom_core::hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_populate_skips_local() {
        let engine = install();
        let seeded = engine.seed_af_packet("itf-pop", true);
        vom_core::hw::disable();
        InterfaceListener.handle_populate("itf-boot");
        vom_core::hw::enable();

        assert!(engine.mutations().is_empty());
        assert_eq!(Om::claims("itf-boot"), 1);
        let itf = Interface::find("itf-pop").unwrap();
        assert_eq!(itf.handle(), seeded);
        assert!(itf.is_configured());
        assert!(itf.admin_state().is_up());
        assert!(Interface::find("local0").is_none());
        drop(itf);

        // the imported interface is torn down once unclaimed
        Om::mark("itf-boot");
        Om::sweep("itf-boot");
        assert_eq!(
            engine.mutations(),
            vec![
                set(1, false),
                Request::AfPacketDelete {
                    host_if_name: "itf-pop".into()
                },
            ]
        );
        vom_core::hw::shutdown();
    }
}
