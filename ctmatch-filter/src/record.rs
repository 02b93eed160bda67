//! Parser for the text form of conntrack entries, as printed by
//! `conntrack -L` or found in `/proc/net/nf_conntrack`:
//!
//! ```text
//! ipv4     2 tcp      6 431999 ESTABLISHED src=10.0.0.1 dst=1.1.1.1 sport=50000 dport=443 src=1.1.1.1 dst=10.0.0.1 sport=443 dport=50000 [ASSURED] mark=0 use=1
//! ```
//!
//! Only what is printed is set on the record. The layer 3 protocol is set
//! when the leading family is there, the status flags are always set since
//! their absence is meaningful (`SEEN_REPLY` unless `[UNREPLIED]`).

use std::net::IpAddr;

use ctmatch_common::{ConnectionRecord, Direction, L3Protocol, Status, TcpState};

use crate::Error;

const TCP: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Header<'a> {
    l3proto: Option<L3Protocol>,
    l4proto: u8,
    timeout: u32,
    state: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Flag(&'a str),
    Pair(&'a str, &'a str),
}

peg::parser!(grammar record_parser() for str {

    pub rule record() -> (Header<'input>, Vec<Token<'input>>)
        = _ h:header() t:token()* { (h, t) }

    rule header() -> Header<'input>
        = l3proto:family()? name() l4proto:proto_number() __ timeout:timeout() _ state:state()? {
            Header { l3proto, l4proto, timeout, state }
        }

    rule family() -> L3Protocol
        = "ipv4" __ "2" __ { L3Protocol::Ipv4 }
        / "ipv6" __ "10" __ { L3Protocol::Ipv6 }

    rule name()
        = ['a'..='z' | '0'..='9' | '-']+ __

    rule proto_number() -> u8
        = n:$(['0'..='9']+) {? n.parse::<u8>().or(Err("invalid protocol number")) }

    rule timeout() -> u32
        = n:$(['0'..='9']+) {? n.parse::<u32>().or(Err("invalid timeout")) }

    rule state() -> &'input str
        = s:$(['A'..='Z'] ['A'..='Z' | '0'..='9' | '_']*) _ { s }

    rule token() -> Token<'input>
        = "[" f:$(['A'..='Z' | '0'..='9' | '_']+) "]" _ { Token::Flag(f) }
        / k:$(['a'..='z' | '_' | '-']+) "=" v:$([^ ' ' | '\t' | '\r' | '\n']+) _ { Token::Pair(k, v) }

    rule __() = quiet!{[' ' | '\t']+}

    rule _() = quiet!{[' ' | '\t' | '\r' | '\n']*}
});

/// Where the parser stands in the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Tuple(Direction),
    Trailer,
}

struct RecordBuilder {
    ct: ConnectionRecord,
    section: Section,
    icmp: bool,
    status: Status,
}

impl RecordBuilder {
    fn new(header: &Header<'_>) -> Result<Self, Error> {
        let mut ct = ConnectionRecord::new();

        for dir in Direction::ALL {
            if let Some(l3proto) = header.l3proto {
                ct.set_l3proto(dir, l3proto);
            }
            ct.set_l4proto(dir, header.l4proto);
        }
        ct.set_timeout(header.timeout);

        // other protocols print states of their own
        if let (Some(state), TCP) = (header.state, header.l4proto) {
            let state = TcpState::from_name(state).ok_or_else(|| Error::Value {
                field: "tcp state",
                value: state.to_owned(),
            })?;
            ct.set_tcp_state(state);
        }

        Ok(Self {
            ct,
            section: Section::Header,
            icmp: false,
            status: Status::SEEN_REPLY,
        })
    }

    fn push(&mut self, token: Token<'_>) -> Result<(), Error> {
        match token {
            Token::Flag(flag) => {
                match flag {
                    "UNREPLIED" => self.status.remove(Status::SEEN_REPLY),
                    "ASSURED" => self.status.insert(Status::ASSURED),
                    "OFFLOAD" => self.status.insert(Status::OFFLOAD),
                    "HW_OFFLOAD" => self.status.insert(Status::HW_OFFLOAD),
                    _ => {}
                }
                self.close_reply();
            }
            Token::Pair("src", value) => {
                let dir = match self.section {
                    Section::Header => Direction::Original,
                    Section::Tuple(Direction::Original) => Direction::Reply,
                    _ => return Err(Error::Unexpected(format!("src={}", value))),
                };
                self.section = Section::Tuple(dir);
                self.icmp = false;
                self.ct.set_src(dir, parse_addr("src", value)?);
            }
            Token::Pair("dst", value) => {
                let dir = self.tuple_direction("dst", value)?;
                self.ct.set_dst(dir, parse_addr("dst", value)?);
            }
            Token::Pair("sport", value) => {
                let dir = self.tuple_direction("sport", value)?;
                self.ct.set_sport(dir, parse_number("sport", value)?);
            }
            Token::Pair("dport", value) => {
                let dir = self.tuple_direction("dport", value)?;
                self.ct.set_dport(dir, parse_number("dport", value)?);
            }
            Token::Pair("type" | "code", _) if self.in_tuple() => self.icmp = true,
            Token::Pair("id", _) if self.in_tuple() && self.icmp => {}
            Token::Pair("packets" | "bytes", _) if self.in_tuple() => {}
            Token::Pair("id", value) => {
                self.close_reply();
                self.ct.set_id(parse_number("id", value)?);
            }
            Token::Pair("mark", value) => {
                self.close_reply();
                self.ct.set_mark(parse_number("mark", value)?);
            }
            Token::Pair(..) => self.close_reply(),
        }

        Ok(())
    }

    fn finish(mut self) -> Result<ConnectionRecord, Error> {
        match self.section {
            Section::Header => return Err(Error::MissingTuple(Direction::Original.display())),
            Section::Tuple(Direction::Original) => {
                return Err(Error::MissingTuple(Direction::Reply.display()))
            }
            _ => {}
        }

        self.ct.set_status(self.status);
        Ok(self.ct)
    }

    fn in_tuple(&self) -> bool {
        matches!(self.section, Section::Tuple(_))
    }

    fn tuple_direction(&self, key: &str, value: &str) -> Result<Direction, Error> {
        match self.section {
            Section::Tuple(dir) => Ok(dir),
            _ => Err(Error::Unexpected(format!("{}={}", key, value))),
        }
    }

    /// Anything not belonging to a tuple ends the reply one.
    fn close_reply(&mut self) {
        if self.section == Section::Tuple(Direction::Reply) {
            self.section = Section::Trailer;
        }
    }
}

fn parse_addr(field: &'static str, value: &str) -> Result<IpAddr, Error> {
    value.parse().map_err(|_| Error::Value {
        field,
        value: value.to_owned(),
    })
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, Error> {
    value.parse().map_err(|_| Error::Value {
        field,
        value: value.to_owned(),
    })
}

/// Parses one conntrack entry.
pub fn parse_record(line: &str) -> Result<ConnectionRecord, Error> {
    let (header, tokens) = record_parser::record(line).map_err(Error::Record)?;

    let mut builder = RecordBuilder::new(&header)?;
    for token in tokens {
        builder.push(token)?;
    }
    builder.finish()
}
