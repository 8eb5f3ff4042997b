//! Interface to bridge-domain bindings.

mod cmds;
mod entity;
mod listener;

pub use cmds::BindCmd;
pub use entity::L2Binding;
pub use listener::L2BindingListener;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge_domain::BridgeDomain;
    use crate::interface::{AdminState, Interface};
    use crate::test_support::install;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use vom_api::{InterfaceHandle, Request};
    use vom_core::{hw, Listener, Om, ResultCode};

    fn bind(index: u32, bd_id: u32, enable: bool) -> Request {
        Request::SwInterfaceSetL2Bridge {
            rx_sw_if_index: InterfaceHandle::new(index),
            bd_id,
            enable,
        }
    }

    #[test]
    #[serial]
    fn test_bind_and_teardown_order() {
        let engine = install();
        let itf = Interface::af_packet("l2-eth", AdminState::Up);
        let bd = BridgeDomain::new(50);
        Om::write("l2-owner", &itf);
        Om::write("l2-owner", &bd);
        engine.clear_requests();

        assert_eq!(
            Om::write("l2-owner", &L2Binding::new(&itf, &bd)),
            ResultCode::Ok
        );
        assert_eq!(engine.mutations(), vec![bind(1, 50, true)]);
        assert!(engine.bridge_domain(50).unwrap().has_member(InterfaceHandle::new(1)));
        assert!(L2Binding::find("l2-eth").unwrap().is_configured());

        engine.clear_requests();
        Om::remove("l2-owner");
        let mutations = engine.mutations();
        // the binding goes before the interface and the domain it holds
        assert_eq!(mutations[0], bind(1, 50, false));
        assert_eq!(mutations.len(), 4);
        assert!(engine.interface("l2-eth").is_none());
        assert!(engine.bridge_domain(50).is_none());
        assert!(L2Binding::find("l2-eth").is_none());
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_rebind_moves_interface_and_frees_old_domain() {
        let engine = install();
        let itf = Interface::af_packet("l2-move", AdminState::Down);
        Om::write("l2-owner", &itf);
        Om::write("l2-owner", &BridgeDomain::new(52));
        Om::write("l2-owner", &BridgeDomain::new(53));
        Om::write("l2-owner", &L2Binding::new(&itf, &BridgeDomain::new(52)));
        engine.clear_requests();

        Om::mark("l2-owner");
        Om::write("l2-owner", &itf);
        Om::write("l2-owner", &BridgeDomain::new(53));
        Om::write("l2-owner", &L2Binding::new(&itf, &BridgeDomain::new(53)));
        Om::sweep("l2-owner");

        assert_eq!(
            engine.mutations(),
            vec![
                bind(1, 53, true),
                Request::BridgeDomainAddDel {
                    bd_id: 52,
                    is_add: false,
                    learn: false
                },
            ]
        );
        assert!(engine.bridge_domain(53).unwrap().has_member(InterfaceHandle::new(1)));
        assert_eq!(L2Binding::find("l2-move").unwrap().bridge_domain().id(), 53);

        Om::remove("l2-owner");
        hw::shutdown();
    }

    #[test]
    #[serial]
    fn test_populate_from_members() {
        let engine = install();
        let h = engine.seed_af_packet("l2-pop", true);
        engine.seed_bridge_domain(54, true, &[h]);

        hw::disable();
        crate::interface::InterfaceListener.handle_populate("l2-boot");
        crate::bridge_domain::BridgeDomainListener.handle_populate("l2-boot");
        L2BindingListener.handle_populate("l2-boot");
        hw::enable();

        assert!(engine.mutations().is_empty());
        assert_eq!(Om::claims("l2-boot"), 3);
        let binding = L2Binding::find("l2-pop").unwrap();
        assert!(binding.is_configured());
        assert_eq!(binding.bridge_domain().id(), 54);
        drop(binding);

        Om::remove("l2-boot");
        assert_eq!(engine.mutations()[0], bind(1, 54, false));
        assert!(engine.interface("l2-pop").is_none());
        assert!(engine.bridge_domain(54).is_none());
        hw::shutdown();
    }
}
