//! Unit tests for translate module

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use crate::translate::*;
    use crds::{IPAssignment, NetworkContainerState};
    use cns_client::NetworkContainerType;

    #[test]
    fn test_status_to_nc_request_single_container() {
        let status = create_test_status(vec![create_test_network_container("nc-1", 2)]);
        let request = status_to_nc_request(&status).unwrap();

        assert_eq!(request.network_container_id, "nc-1");
        assert_eq!(request.network_container_type, NetworkContainerType::Docker);
        assert_eq!(request.version, "2");
        assert_eq!(request.ip_configuration.ip_subnet.ip_address, "10.0.0.4");
        assert_eq!(request.ip_configuration.ip_subnet.prefix_length, 24);
        assert_eq!(request.ip_configuration.gateway_ip_address, "10.0.0.1");
        assert_eq!(request.secondary_ip_configs.len(), 2);

        let first = &request.secondary_ip_configs["nc-1-ip-0"];
        assert_eq!(first.ip_address, "10.0.0.10");
        assert_eq!(first.nc_version, 2);
    }

    #[test]
    fn test_status_to_nc_request_last_container_wins() {
        let status = create_test_status(vec![
            create_test_network_container("nc-1", 1),
            create_test_network_container("nc-2", 3),
        ]);
        let request = status_to_nc_request(&status).unwrap();
        assert_eq!(request.network_container_id, "nc-2");
        assert_eq!(request.secondary_ip_configs.len(), 3);
    }

    #[test]
    fn test_status_to_nc_request_validates_every_container() {
        let mut broken = create_test_network_container("nc-1", 1);
        broken.primary_ip = "not-an-ip".to_string();
        let status = create_test_status(vec![broken, create_test_network_container("nc-2", 1)]);

        let err = status_to_nc_request(&status).unwrap_err();
        assert_eq!(
            err,
            TranslationError::InvalidPrimaryIp {
                network_container_id: "nc-1".to_string(),
                ip: "not-an-ip".to_string(),
            }
        );
    }

    #[test]
    fn test_status_to_nc_request_rejects_bad_subnet() {
        let mut nc = create_test_network_container("nc-1", 0);
        nc.subnet_address_space = "10.0.0.0/99".to_string();
        let err = status_to_nc_request(&create_test_status(vec![nc])).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidSubnet { .. }));
    }

    #[test]
    fn test_status_to_nc_request_rejects_bad_secondary_ip() {
        let mut nc = create_test_network_container("nc-1", 1);
        nc.ip_assignments.push(IPAssignment {
            name: "broken".to_string(),
            ip: "10.0.0.300".to_string(),
        });
        let err = status_to_nc_request(&create_test_status(vec![nc])).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidSecondaryIp { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_status_to_nc_request_without_containers() {
        let err = status_to_nc_request(&create_test_status(vec![])).unwrap_err();
        assert_eq!(err, TranslationError::NoNetworkContainers);
    }

    #[test]
    fn test_pods_to_pod_info_by_ip_excludes_host_network() {
        let pods = vec![
            create_test_pod("web-0", "node-1", Some("10.0.0.10"), false),
            create_test_pod("kube-proxy", "node-1", Some("10.240.0.4"), true),
        ];
        let pod_info_by_ip = pods_to_pod_info_by_ip(&pods);

        assert_eq!(pod_info_by_ip.len(), 1);
        let web = &pod_info_by_ip["10.0.0.10"];
        assert_eq!(web.pod_name, "web-0");
        assert_eq!(web.pod_namespace, "default");
    }

    #[test]
    fn test_pods_to_pod_info_by_ip_skips_pods_without_ip() {
        let pods = vec![
            create_test_pod("pending", "node-1", None, false),
            create_test_pod("starting", "node-1", Some(""), false),
        ];
        assert!(pods_to_pod_info_by_ip(&pods).is_empty());
    }

    #[test]
    fn test_multitenant_status_to_nc_request() {
        let nc = create_test_multitenant_nc("tenant-nc", "node-1", NetworkContainerState::Initialized);
        let request = multitenant_status_to_nc_request(&nc).unwrap();

        assert_eq!(request.network_container_id, "tenant-nc-uuid");
        assert_eq!(request.ip_configuration.ip_subnet.ip_address, "192.168.0.4");
        assert_eq!(request.ip_configuration.ip_subnet.prefix_length, 24);
        assert_eq!(request.ip_configuration.gateway_ip_address, "192.168.0.1");
        assert_eq!(request.primary_interface_identifier.as_deref(), Some("10.1.0.4"));
        assert!(request.secondary_ip_configs.is_empty());
    }

    #[test]
    fn test_multitenant_status_to_nc_request_requires_uuid() {
        let mut nc = create_test_multitenant_nc("tenant-nc", "node-1", NetworkContainerState::Initialized);
        nc.spec.uuid.clear();
        assert_eq!(
            multitenant_status_to_nc_request(&nc).unwrap_err(),
            TranslationError::MissingNetworkContainerId
        );
    }
}
