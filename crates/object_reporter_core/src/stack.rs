//! Deployment template for the whole pipeline.
//!
//! The resource graph is declared in Rust and rendered as a CloudFormation
//! JSON document: the upload bucket and its notification, the metadata table,
//! both functions with least-privilege roles, and the public network plus
//! load balancer that fronts the report function.

use serde_json::{json, Map, Value};

use crate::contract::{ValidationError, OBJECT_KEY_ATTRIBUTE};
use crate::routing::{HostPattern, Listener, ListenerAction};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
pub const ENV_METADATA_TABLE_NAME: &str = "METADATA_TABLE_NAME";
pub const ENV_OBJECT_BUCKET_NAME: &str = "OBJECT_BUCKET_NAME";
pub const ENV_LOG_FILTER: &str = "RUST_LOG";
pub const LAMBDA_RUNTIME: &str = "provided.al2023";
pub const LAMBDA_HANDLER: &str = "bootstrap";
pub const DEFAULT_OBJECT_BUCKET_NAME: &str = "s3-object-reporter-uploads";
pub const MAX_LISTENER_RULE_PRIORITY: u32 = 50_000;

const VPC_CIDR: &str = "10.0.0.0/16";
const BASIC_EXECUTION_POLICY: &str =
    "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Arm64,
    X86_64,
}

impl Architecture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
        }
    }

    pub fn rust_target(self) -> &'static str {
        match self {
            Self::Arm64 => "aarch64-unknown-linux-gnu",
            Self::X86_64 => "x86_64-unknown-linux-gnu",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSpec {
    pub description: String,
    pub object_bucket_name: String,
    pub ingest_artifact_key: String,
    pub report_artifact_key: String,
    pub architecture: Architecture,
    pub memory_size_mb: u32,
    pub timeout_seconds: u32,
    pub log_filter: String,
    pub max_azs: usize,
    pub listener: Listener,
}

impl Default for StackSpec {
    fn default() -> Self {
        Self {
            description: "S3 object reporter: upload metadata table with an HTML listing behind an ALB"
                .to_string(),
            object_bucket_name: DEFAULT_OBJECT_BUCKET_NAME.to_string(),
            ingest_artifact_key: "object-reporter/ingest.zip".to_string(),
            report_artifact_key: "object-reporter/report.zip".to_string(),
            architecture: Architecture::Arm64,
            memory_size_mb: 128,
            timeout_seconds: 10,
            log_filter: "info".to_string(),
            max_azs: 2,
            listener: Listener::report_listener(),
        }
    }
}

impl StackSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_bucket_name(&self.object_bucket_name)?;

        // An application load balancer needs subnets in at least two zones.
        if !(2..=6).contains(&self.max_azs) {
            return Err(ValidationError::new(format!(
                "max_azs must be between 2 and 6, got {}",
                self.max_azs
            )));
        }

        if !(128..=10_240).contains(&self.memory_size_mb) {
            return Err(ValidationError::new(format!(
                "memory_size_mb must be between 128 and 10240, got {}",
                self.memory_size_mb
            )));
        }

        if !(1..=900).contains(&self.timeout_seconds) {
            return Err(ValidationError::new(format!(
                "timeout_seconds must be between 1 and 900, got {}",
                self.timeout_seconds
            )));
        }

        let mut priorities = Vec::with_capacity(self.listener.rules.len());
        for rule in &self.listener.rules {
            if rule.name.is_empty() || !rule.name.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ValidationError::new(format!(
                    "listener rule name '{}' must be non-empty and alphanumeric",
                    rule.name
                )));
            }
            if !(1..=MAX_LISTENER_RULE_PRIORITY).contains(&rule.priority) {
                return Err(ValidationError::new(format!(
                    "listener rule '{}' priority must be between 1 and {MAX_LISTENER_RULE_PRIORITY}",
                    rule.name
                )));
            }
            if priorities.contains(&rule.priority) {
                return Err(ValidationError::new(format!(
                    "listener rule priority {} is used more than once",
                    rule.priority
                )));
            }
            if rule.host_headers.is_empty() {
                return Err(ValidationError::new(format!(
                    "listener rule '{}' needs at least one host header",
                    rule.name
                )));
            }
            priorities.push(rule.priority);
        }

        if matches!(self.listener.default_action, ListenerAction::ForwardToReport) {
            return Err(ValidationError::new(
                "the listener default action must be a fixed response",
            ));
        }

        Ok(())
    }

    pub fn template(&self) -> Result<Value, ValidationError> {
        self.validate()?;

        let mut resources = Map::new();
        self.storage_resources(&mut resources);
        self.function_resources(&mut resources);
        self.network_resources(&mut resources);
        self.load_balancer_resources(&mut resources);

        Ok(json!({
            "AWSTemplateFormatVersion": TEMPLATE_FORMAT_VERSION,
            "Description": self.description,
            "Parameters": self.parameters(),
            "Resources": resources,
            "Outputs": {
                "Endpoint": {
                    "Description": "Load balancer DNS Name",
                    "Value": get_att("LoadBalancer", "DNSName"),
                    "Export": { "Name": "albDnsName" },
                },
                "TableName": {
                    "Description": "Object metadata table",
                    "Value": reference("MetadataTable"),
                },
                "BucketName": {
                    "Description": "Bucket whose uploads are recorded",
                    "Value": reference("ObjectBucket"),
                },
            },
        }))
    }

    fn parameters(&self) -> Value {
        json!({
            "ArtifactBucket": {
                "Type": "String",
                "Description": "Bucket holding the packaged function zips",
            },
            "IngestArtifactKey": {
                "Type": "String",
                "Default": self.ingest_artifact_key,
            },
            "ReportArtifactKey": {
                "Type": "String",
                "Default": self.report_artifact_key,
            },
            "ObjectBucketName": {
                "Type": "String",
                "Default": self.object_bucket_name,
                "AllowedPattern": "^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$",
            },
        })
    }

    fn storage_resources(&self, resources: &mut Map<String, Value>) {
        resources.insert(
            "MetadataTable".to_string(),
            json!({
                "Type": "AWS::DynamoDB::Table",
                "DeletionPolicy": "Retain",
                "UpdateReplacePolicy": "Retain",
                "Properties": {
                    "AttributeDefinitions": [
                        { "AttributeName": OBJECT_KEY_ATTRIBUTE, "AttributeType": "S" }
                    ],
                    "KeySchema": [
                        { "AttributeName": OBJECT_KEY_ATTRIBUTE, "KeyType": "HASH" }
                    ],
                    "BillingMode": "PAY_PER_REQUEST",
                },
            }),
        );

        // The permission must exist before S3 validates the notification target.
        resources.insert(
            "ObjectBucket".to_string(),
            json!({
                "Type": "AWS::S3::Bucket",
                "DeletionPolicy": "Retain",
                "UpdateReplacePolicy": "Retain",
                "DependsOn": ["IngestInvokePermission"],
                "Properties": {
                    "BucketName": reference("ObjectBucketName"),
                    "NotificationConfiguration": {
                        "LambdaConfigurations": [{
                            "Event": "s3:ObjectCreated:*",
                            "Function": get_att("IngestFunction", "Arn"),
                        }],
                    },
                },
            }),
        );

        resources.insert(
            "IngestInvokePermission".to_string(),
            json!({
                "Type": "AWS::Lambda::Permission",
                "Properties": {
                    "Action": "lambda:InvokeFunction",
                    "FunctionName": get_att("IngestFunction", "Arn"),
                    "Principal": "s3.amazonaws.com",
                    "SourceAccount": reference("AWS::AccountId"),
                    "SourceArn": sub("arn:${AWS::Partition}:s3:::${ObjectBucketName}"),
                },
            }),
        );
    }

    fn function_resources(&self, resources: &mut Map<String, Value>) {
        resources.insert(
            "IngestFunctionRole".to_string(),
            function_role("ingest-table-write", &["dynamodb:PutItem"]),
        );
        resources.insert(
            "ReportFunctionRole".to_string(),
            function_role("report-table-read", &["dynamodb:Scan"]),
        );

        resources.insert(
            "IngestFunction".to_string(),
            self.function(
                "Records key and size of every created object",
                "IngestFunctionRole",
                "IngestArtifactKey",
                environment(&[
                    (ENV_METADATA_TABLE_NAME, reference("MetadataTable")),
                    (ENV_LOG_FILTER, Value::String(self.log_filter.clone())),
                ]),
            ),
        );
        resources.insert(
            "ReportFunction".to_string(),
            self.function(
                "Renders the object metadata table as an HTML listing",
                "ReportFunctionRole",
                "ReportArtifactKey",
                environment(&[
                    (ENV_METADATA_TABLE_NAME, reference("MetadataTable")),
                    (ENV_OBJECT_BUCKET_NAME, reference("ObjectBucketName")),
                    (ENV_LOG_FILTER, Value::String(self.log_filter.clone())),
                ]),
            ),
        );
    }

    fn function(&self, description: &str, role: &str, artifact_key: &str, env: Value) -> Value {
        json!({
            "Type": "AWS::Lambda::Function",
            "Properties": {
                "Description": description,
                "Runtime": LAMBDA_RUNTIME,
                "Handler": LAMBDA_HANDLER,
                "Architectures": [self.architecture.as_str()],
                "MemorySize": self.memory_size_mb,
                "Timeout": self.timeout_seconds,
                "Role": get_att(role, "Arn"),
                "Code": {
                    "S3Bucket": reference("ArtifactBucket"),
                    "S3Key": reference(artifact_key),
                },
                "Environment": { "Variables": env },
            },
        })
    }

    // Public subnets only: the functions run outside the VPC, so no NAT or
    // endpoints are needed.
    fn network_resources(&self, resources: &mut Map<String, Value>) {
        resources.insert(
            "Vpc".to_string(),
            json!({
                "Type": "AWS::EC2::VPC",
                "Properties": {
                    "CidrBlock": VPC_CIDR,
                    "EnableDnsSupport": true,
                    "EnableDnsHostnames": true,
                    "Tags": [{ "Key": "Name", "Value": sub("${AWS::StackName}-vpc") }],
                },
            }),
        );
        resources.insert(
            "InternetGateway".to_string(),
            json!({ "Type": "AWS::EC2::InternetGateway" }),
        );
        resources.insert(
            "VpcGatewayAttachment".to_string(),
            json!({
                "Type": "AWS::EC2::VPCGatewayAttachment",
                "Properties": {
                    "VpcId": reference("Vpc"),
                    "InternetGatewayId": reference("InternetGateway"),
                },
            }),
        );
        resources.insert(
            "PublicRouteTable".to_string(),
            json!({
                "Type": "AWS::EC2::RouteTable",
                "Properties": { "VpcId": reference("Vpc") },
            }),
        );
        resources.insert(
            "PublicDefaultRoute".to_string(),
            json!({
                "Type": "AWS::EC2::Route",
                "DependsOn": ["VpcGatewayAttachment"],
                "Properties": {
                    "RouteTableId": reference("PublicRouteTable"),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": reference("InternetGateway"),
                },
            }),
        );

        for zone_index in 0..self.max_azs {
            let subnet = public_subnet_id(zone_index);
            resources.insert(
                subnet.clone(),
                json!({
                    "Type": "AWS::EC2::Subnet",
                    "Properties": {
                        "VpcId": reference("Vpc"),
                        "CidrBlock": format!("10.0.{zone_index}.0/24"),
                        "AvailabilityZone": { "Fn::Select": [zone_index, { "Fn::GetAZs": "" }] },
                        "MapPublicIpOnLaunch": true,
                    },
                }),
            );
            resources.insert(
                format!("{subnet}RouteTableAssociation"),
                json!({
                    "Type": "AWS::EC2::SubnetRouteTableAssociation",
                    "Properties": {
                        "SubnetId": reference(&subnet),
                        "RouteTableId": reference("PublicRouteTable"),
                    },
                }),
            );
        }

        resources.insert(
            "LoadBalancerSecurityGroup".to_string(),
            json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupDescription": "Inbound HTTP to the report load balancer",
                    "VpcId": reference("Vpc"),
                    "SecurityGroupIngress": [{
                        "IpProtocol": "tcp",
                        "FromPort": self.listener.port,
                        "ToPort": self.listener.port,
                        "CidrIp": "0.0.0.0/0",
                    }],
                },
            }),
        );
    }

    fn load_balancer_resources(&self, resources: &mut Map<String, Value>) {
        let subnets: Vec<Value> = (0..self.max_azs)
            .map(|zone_index| reference(&public_subnet_id(zone_index)))
            .collect();

        resources.insert(
            "LoadBalancer".to_string(),
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::LoadBalancer",
                "DependsOn": ["VpcGatewayAttachment"],
                "Properties": {
                    "Type": "application",
                    "Scheme": "internet-facing",
                    "Subnets": subnets,
                    "SecurityGroups": [reference("LoadBalancerSecurityGroup")],
                },
            }),
        );
        resources.insert(
            "HttpListener".to_string(),
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::Listener",
                "Properties": {
                    "LoadBalancerArn": reference("LoadBalancer"),
                    "Port": self.listener.port,
                    "Protocol": "HTTP",
                    "DefaultActions": [listener_action(&self.listener.default_action)],
                },
            }),
        );

        // No SourceArn: the target group already depends on this permission.
        resources.insert(
            "ReportInvokePermission".to_string(),
            json!({
                "Type": "AWS::Lambda::Permission",
                "Properties": {
                    "Action": "lambda:InvokeFunction",
                    "FunctionName": get_att("ReportFunction", "Arn"),
                    "Principal": "elasticloadbalancing.amazonaws.com",
                    "SourceAccount": reference("AWS::AccountId"),
                },
            }),
        );
        resources.insert(
            "ReportTargetGroup".to_string(),
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::TargetGroup",
                "DependsOn": ["ReportInvokePermission"],
                "Properties": {
                    "TargetType": "lambda",
                    "HealthCheckEnabled": false,
                    "Targets": [{ "Id": get_att("ReportFunction", "Arn") }],
                },
            }),
        );

        for rule in &self.listener.rules {
            let host_values: Vec<Value> = rule
                .host_headers
                .iter()
                .map(|pattern| match pattern {
                    HostPattern::OwnDnsName => get_att("LoadBalancer", "DNSName"),
                    HostPattern::Exact(host) => Value::String(host.clone()),
                })
                .collect();
            resources.insert(
                format!("{}ListenerRule", rule.name),
                json!({
                    "Type": "AWS::ElasticLoadBalancingV2::ListenerRule",
                    "Properties": {
                        "ListenerArn": reference("HttpListener"),
                        "Priority": rule.priority,
                        "Conditions": [{
                            "Field": "host-header",
                            "HostHeaderConfig": { "Values": host_values },
                        }],
                        "Actions": [listener_action(&rule.action)],
                    },
                }),
            );
        }
    }
}

fn function_role(policy_name: &str, table_actions: &[&str]) -> Value {
    json!({
        "Type": "AWS::IAM::Role",
        "Properties": {
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Service": "lambda.amazonaws.com" },
                    "Action": "sts:AssumeRole",
                }],
            },
            "ManagedPolicyArns": [sub(BASIC_EXECUTION_POLICY)],
            "Policies": [{
                "PolicyName": policy_name,
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": table_actions,
                        "Resource": get_att("MetadataTable", "Arn"),
                    }],
                },
            }],
        },
    })
}

fn listener_action(action: &ListenerAction) -> Value {
    match action {
        ListenerAction::ForwardToReport => json!({
            "Type": "forward",
            "TargetGroupArn": reference("ReportTargetGroup"),
        }),
        ListenerAction::FixedResponse {
            status_code,
            content_type,
            body,
        } => json!({
            "Type": "fixed-response",
            "FixedResponseConfig": {
                "StatusCode": status_code.to_string(),
                "ContentType": content_type,
                "MessageBody": body,
            },
        }),
    }
}

fn validate_bucket_name(name: &str) -> Result<(), ValidationError> {
    let valid_chars = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-');
    let valid_edges = name
        .bytes()
        .next()
        .zip(name.bytes().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);

    if !(3..=63).contains(&name.len()) || !valid_chars || !valid_edges {
        return Err(ValidationError::new(format!(
            "'{name}' is not a valid S3 bucket name"
        )));
    }
    Ok(())
}

fn environment(variables: &[(&str, Value)]) -> Value {
    Value::Object(
        variables
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    )
}

fn public_subnet_id(zone_index: usize) -> String {
    format!("PublicSubnet{}", zone_index + 1)
}

fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}
