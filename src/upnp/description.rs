//! Service description data
//!
//! Format-independent model of an SCPD (actions plus state variable table)
//! and of an evented property set.

/// Direction of an action argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentDirection {
    In,
    Out,
}

impl ArgumentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgumentDirection::In => "in",
            ArgumentDirection::Out => "out",
        }
    }
}

/// One action argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub direction: ArgumentDirection,
    pub related_state_variable: String,
}

/// One action and its arguments, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub arguments: Vec<Argument>,
}

/// One entry of the state variable table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVariable {
    pub name: String,
    /// UPnP data type (`string`, `i4`, ...)
    pub data_type: String,
    pub send_events: bool,
    pub allowed_values: Vec<String>,
}

/// Actions and state variables of a service
#[derive(Debug, Clone, Default)]
pub struct ServiceDescription {
    pub actions: Vec<Action>,
    pub state_variables: Vec<StateVariable>,
}

impl ServiceDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an action from `(name, direction, related state variable)` triples
    pub fn add_action(&mut self, name: &str, arguments: &[(&str, ArgumentDirection, &str)]) {
        self.actions.push(Action {
            name: name.to_string(),
            arguments: arguments
                .iter()
                .map(|(name, direction, variable)| Argument {
                    name: name.to_string(),
                    direction: *direction,
                    related_state_variable: variable.to_string(),
                })
                .collect(),
        });
    }

    /// Declare a state variable
    pub fn add_state_variable(
        &mut self,
        name: &str,
        data_type: &str,
        send_events: bool,
        allowed_values: &[&str],
    ) {
        self.state_variables.push(StateVariable {
            name: name.to_string(),
            data_type: data_type.to_string(),
            send_events,
            allowed_values: allowed_values.iter().map(|v| v.to_string()).collect(),
        });
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables.iter().find(|v| v.name == name)
    }
}

/// Evented state variable values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    properties: Vec<(String, String)>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_property(&mut self, name: &str, value: impl Into<String>) {
        self.properties.push((name.to_string(), value.into()));
    }

    /// Value of a property, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_action() {
        let mut desc = ServiceDescription::new();
        desc.add_action(
            "GetProtocolInfo",
            &[
                ("Source", ArgumentDirection::Out, "SourceProtocolInfo"),
                ("Sink", ArgumentDirection::Out, "SinkProtocolInfo"),
            ],
        );

        let action = desc.action("GetProtocolInfo").unwrap();
        assert_eq!(action.arguments.len(), 2);
        assert_eq!(action.arguments[1].name, "Sink");
        assert_eq!(action.arguments[1].direction.as_str(), "out");
        assert!(desc.action("Browse").is_none());
    }

    #[test]
    fn test_property_set() {
        let mut propset = PropertySet::new();
        assert!(propset.is_empty());

        propset.add_property("CurrentConnectionIDs", "1,2");
        propset.add_property("SinkProtocolInfo", "");

        assert_eq!(propset.len(), 2);
        assert_eq!(propset.get("CurrentConnectionIDs"), Some("1,2"));
        assert_eq!(propset.get("SinkProtocolInfo"), Some(""));
        assert_eq!(propset.get("Missing"), None);
    }
}
