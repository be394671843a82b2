use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, ObjectFieldSelector, Pod, VolumeMount,
};

/// Pod annotation overriding the sidecar's `-sync-period`.
pub const ANNOTATION_SYNC_PERIOD: &str = "meshsync.io/connect-sync-period";

pub const SIDECAR_CONTAINER_NAME: &str = "meshsync-connect-sidecar";

/// Shared volume the injector writes the service config (and ACL token) into.
pub const VOLUME_NAME: &str = "meshsync-connect-inject-data";

const ENTRYPOINT: &str = "meshsync";
const MOUNT_PATH: &str = "/meshsync/connect-inject";
const SERVICE_CONFIG_PATH: &str = "/meshsync/connect-inject/service.hcl";
const TOKEN_FILE_PATH: &str = "/meshsync/connect-inject/acl-token";

const HOST_IP_ENV: &str = "HOST_IP";
const REGISTRY_HTTP_ADDR_ENV: &str = "REGISTRY_HTTP_ADDR";
const AGENT_HTTP_PORT: u16 = 8500;

/// The part of the injector's configuration the sidecar container depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectorConfig {
    /// Image containing the `meshsync` binary.
    pub image: String,

    /// ACL auth method used by the init container to log in. When set, the sidecar is pointed
    /// at the token file it produces.
    pub auth_method: Option<String>,
}

impl InjectorConfig {
    fn has_auth_method(&self) -> bool {
        self.auth_method
            .as_deref()
            .is_some_and(|auth_method| !auth_method.is_empty())
    }

    fn sidecar_command(&self, pod: &Pod) -> Vec<String> {
        let mut command = vec![
            ENTRYPOINT.to_owned(),
            "connect-sidecar".to_owned(),
            "-service-config".to_owned(),
            SERVICE_CONFIG_PATH.to_owned(),
        ];

        if self.has_auth_method() {
            command.push(format!("-token-file={TOKEN_FILE_PATH}"));
        }

        if let Some(period) = pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(ANNOTATION_SYNC_PERIOD))
        {
            command.push(format!("-sync-period={}", period.trim()));
        }

        command
    }

    /// Builds the `connect-sidecar` container for `pod`.
    pub fn connect_sidecar(&self, pod: &Pod) -> Container {
        Container {
            name: SIDECAR_CONTAINER_NAME.to_owned(),
            image: Some(self.image.clone()),
            env: Some(vec![
                EnvVar {
                    name: HOST_IP_ENV.to_owned(),
                    value_from: Some(EnvVarSource {
                        field_ref: Some(ObjectFieldSelector {
                            field_path: "status.hostIP".to_owned(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                // Interpolated by the kubelet once `HOST_IP` is resolved.
                EnvVar {
                    name: REGISTRY_HTTP_ADDR_ENV.to_owned(),
                    value: Some(format!("$({HOST_IP_ENV}):{AGENT_HTTP_PORT}")),
                    ..Default::default()
                },
            ]),
            volume_mounts: Some(vec![VolumeMount {
                name: VOLUME_NAME.to_owned(),
                mount_path: MOUNT_PATH.to_owned(),
                ..Default::default()
            }]),
            command: Some(self.sidecar_command(pod)),
            ..Default::default()
        }
    }
}
