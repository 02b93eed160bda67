use crate::CompareFlags;

peg::parser!(pub grammar policy_parser() for str {

    pub rule policy() -> CompareFlags
        = _ terms:(term() ++ separator()) _ { terms.into_iter().fold(CompareFlags::empty(), |acc, t| acc | t) }

    rule term() -> CompareFlags
        = full() / original() / reply() / timeout()

    rule full() -> CompareFlags
        = ("all" / "full") { CompareFlags::FULL }

    rule original() -> CompareFlags
        = ("original" / "orig") { CompareFlags::ORIGINAL }

    rule reply() -> CompareFlags
        = ("reply" / "repl") { CompareFlags::REPLY }

    rule timeout() -> CompareFlags
        = "timeout[" _ rels:(relation() ++ (_ "|" _)) _ "]" {
            rels.into_iter().fold(CompareFlags::empty(), |acc, r| acc | r)
        }

    rule relation() -> CompareFlags
        = "eq" { CompareFlags::TIMEOUT_EQ }
        / "gt" { CompareFlags::TIMEOUT_GT }
        / "lt" { CompareFlags::TIMEOUT_LT }
        / "ge" { CompareFlags::TIMEOUT_GE }
        / "le" { CompareFlags::TIMEOUT_LE }
        / "any" { CompareFlags::TIMEOUT_ANY }

    rule separator()
        = _ ("and" / ",") _

    rule _() =  quiet!{[' ' | '\t']*}
});
