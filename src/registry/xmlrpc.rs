//! Minimal XML-RPC codec for the ROS master and node APIs.
//!
//! Only what those APIs exchange is supported: scalars (int/i4/i8, boolean,
//! string, double), arrays, structs, `nil`, and fault responses. Calls are
//! written directly; responses are read through `roxmltree`.

use roxmltree::{Document, Node};
use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Double(f64),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XmlRpcError {
    #[error("xml-rpc parse error: {0}")]
    Parse(String),

    #[error("xml-rpc fault {code}: {message}")]
    Fault { code: i64, message: String },
}

/// Serialize a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for p in params {
        out.push_str("<param>");
        encode_value(&mut out, p);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

fn encode_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(i) => {
            let _ = write!(out, "<int>{}</int>", i);
        }
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", if *b { 1 } else { 0 });
        }
        Value::Str(s) => {
            let _ = write!(out, "<string>{}</string>", escape(s));
        }
        Value::Double(d) => {
            let _ = write!(out, "<double>{}</double>", d);
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, v) in members {
                let _ = write!(out, "<member><name>{}</name>", escape(name));
                encode_value(out, v);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

/// Parse a `methodResponse` document into its single return value.
///
/// A `<fault>` response becomes `XmlRpcError::Fault`.
pub fn decode_response(xml: &str) -> Result<Value, XmlRpcError> {
    let doc = Document::parse(xml).map_err(|e| XmlRpcError::Parse(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "methodResponse" {
        return Err(parse_err(root, "expected <methodResponse>"));
    }

    let body = only_child(root)?;
    match body.tag_name().name() {
        "params" => {
            let param = only_child(body)?;
            expect_tag(param, "param")?;
            decode_value(only_child(param)?)
        }
        "fault" => Err(fault_from(decode_value(only_child(body)?)?)),
        _ => Err(parse_err(body, "expected <params> or <fault>")),
    }
}

fn decode_value(node: Node<'_, '_>) -> Result<Value, XmlRpcError> {
    expect_tag(node, "value")?;

    // Untyped content is a string.
    let Some(typed) = elements(node).next() else {
        return Ok(Value::Str(text_of(node)));
    };
    if elements(node).count() > 1 {
        return Err(parse_err(node, "more than one typed element in <value>"));
    }

    let text = text_of(typed);
    let v = match typed.tag_name().name() {
        "int" | "i4" | "i8" => Value::Int(
            text.trim()
                .parse()
                .map_err(|_| parse_err(typed, format!("bad integer {:?}", text)))?,
        ),
        "boolean" => match text.trim() {
            "1" => Value::Bool(true),
            "0" => Value::Bool(false),
            other => return Err(parse_err(typed, format!("bad boolean {:?}", other))),
        },
        "double" => Value::Double(
            text.trim()
                .parse()
                .map_err(|_| parse_err(typed, format!("bad double {:?}", text)))?,
        ),
        "string" | "dateTime.iso8601" | "base64" => Value::Str(text),
        "nil" => Value::Nil,
        "array" => {
            let items = match elements(typed).next() {
                Some(data) => {
                    expect_tag(data, "data")?;
                    elements(data).map(decode_value).collect::<Result<_, _>>()?
                }
                None => Vec::new(),
            };
            Value::Array(items)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in elements(typed) {
                expect_tag(member, "member")?;
                let mut parts = elements(member);
                let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
                    return Err(parse_err(member, "<member> needs <name> and <value>"));
                };
                expect_tag(name, "name")?;
                members.insert(text_of(name), decode_value(value)?);
            }
            Value::Struct(members)
        }
        other => return Err(parse_err(typed, format!("unsupported value type <{}>", other))),
    };
    Ok(v)
}

fn fault_from(v: Value) -> XmlRpcError {
    let (code, message) = match &v {
        Value::Struct(members) => (
            members.get("faultCode").and_then(Value::as_i64).unwrap_or(0),
            members
                .get("faultString")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        _ => (0, format!("{:?}", v)),
    };
    XmlRpcError::Fault { code, message }
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn only_child<'a, 'input>(node: Node<'a, 'input>) -> Result<Node<'a, 'input>, XmlRpcError> {
    let mut children = elements(node);
    match (children.next(), children.next()) {
        (Some(child), None) => Ok(child),
        _ => Err(parse_err(
            node,
            format!("<{}> must hold exactly one element", node.tag_name().name()),
        )),
    }
}

fn expect_tag(node: Node<'_, '_>, name: &str) -> Result<(), XmlRpcError> {
    if node.tag_name().name() == name {
        Ok(())
    } else {
        Err(parse_err(
            node,
            format!("expected <{}>, found <{}>", name, node.tag_name().name()),
        ))
    }
}

/// Concatenated character data directly under `node`.
fn text_of(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|t| t.text())
        .collect()
}

fn parse_err(node: Node<'_, '_>, msg: impl Into<String>) -> XmlRpcError {
    let at = node.document().text_pos_at(node.range().start);
    XmlRpcError::Parse(format!("{} at {}", msg.into(), at))
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    #[test]
    fn test_encode_call() {
        let xml = encode_call("lookupNode", &["/probe".into(), "/a&b".into()]);
        assert!(xml.starts_with("<?xml version=\"1.0\"?>"));
        assert!(xml.contains("<methodName>lookupNode</methodName>"));
        assert!(xml.contains("<param><value><string>/probe</string></value></param>"));
        assert!(xml.contains("<string>/a&amp;b</string>"));
    }

    #[test]
    fn test_decode_system_state_shape() {
        let xml = r#"<?xml version='1.0'?>
<methodResponse>
<params>
<param>
<value><array><data>
<value><int>1</int></value>
<value><string>current system state</string></value>
<value><array><data>
  <value><array><data>
    <value><array><data>
      <value><string>/chatter</string></value>
      <value><array><data><value><string>/talker</string></value></data></array></value>
    </data></array></value>
  </data></array></value>
  <value><array><data></data></array></value>
  <value><array><data/></array></value>
</data></array></value>
</data></array></value>
</param>
</params>
</methodResponse>
"#;
        let v = decode_response(xml).unwrap();
        let items = v.as_array().unwrap();
        assert_eq!(items[0], Value::Int(1));
        assert_eq!(items[1], s("current system state"));

        let state = items[2].as_array().unwrap();
        assert_eq!(state.len(), 3);
        assert_eq!(
            state[0],
            Value::Array(vec![Value::Array(vec![
                s("/chatter"),
                Value::Array(vec![s("/talker")]),
            ])])
        );
        assert_eq!(state[1], Value::Array(vec![]));
        assert_eq!(state[2], Value::Array(vec![]));
    }

    #[test]
    fn test_decode_untyped_string_and_scalars() {
        let xml = "<methodResponse><params><param><value><array><data>\
            <value>plain &lt;text&gt;</value>\
            <value><i4>-3</i4></value>\
            <value><boolean>1</boolean></value>\
            <value><double>2.5</double></value>\
            <value/>\
            <value><string/></value>\
            <value><nil/></value>\
            </data></array></value></param></params></methodResponse>";
        let v = decode_response(xml).unwrap();
        assert_eq!(
            v,
            Value::Array(vec![
                s("plain <text>"),
                Value::Int(-3),
                Value::Bool(true),
                Value::Double(2.5),
                s(""),
                s(""),
                Value::Nil,
            ])
        );
    }

    #[test]
    fn test_decode_fault() {
        let xml = r#"<?xml version="1.0"?>
<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><int>4</int></value></member>
<member><name>faultString</name><value><string>Too many parameters.</string></value></member>
</struct></value></fault></methodResponse>"#;
        let err = decode_response(xml).unwrap_err();
        assert_eq!(
            err,
            XmlRpcError::Fault {
                code: 4,
                message: "Too many parameters.".to_string()
            }
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_response("<html>oops</html>"),
            Err(XmlRpcError::Parse(_))
        ));
        assert!(matches!(
            decode_response("<methodResponse><params><param><value><int>x</int></value></param></params></methodResponse>"),
            Err(XmlRpcError::Parse(_))
        ));
    }

    #[test]
    fn test_entities() {
        let xml = "<methodResponse><params><param><value><string>a&amp;b&#65;&#x42;</string></value>\
            </param></params></methodResponse>";
        assert_eq!(decode_response(xml).unwrap(), s("a&bAB"));
        assert!(decode_response(
            "<methodResponse><params><param><value>&bogus;</value></param></params></methodResponse>"
        )
        .is_err());
    }

    #[test]
    fn test_parse_error_reports_position() {
        let err = decode_response("<methodResponse>\n<params><param><value><boolean>2</boolean></value>\
            </param></params></methodResponse>")
        .unwrap_err();
        assert!(err.to_string().contains("bad boolean"), "{}", err);
        assert!(err.to_string().contains("at 2:"), "{}", err);
    }

    #[test]
    fn test_encoded_call_is_readable_by_decoder_shape() {
        // A methodCall body uses the same <value> grammar as responses.
        let xml = encode_call("getPid", &[Value::Array(vec![Value::Int(7), Value::Bool(false)])]);
        let body = xml
            .split("<param>")
            .nth(1)
            .and_then(|p| p.split("</param>").next())
            .unwrap();
        let wrapped = format!(
            "<methodResponse><params><param>{}</param></params></methodResponse>",
            body
        );
        assert_eq!(
            decode_response(&wrapped).unwrap(),
            Value::Array(vec![Value::Int(7), Value::Bool(false)])
        );
    }
}
