//! Recursive-descent XPath 1.0 parser.
//!
//! Precedence, loosest first: `or`, `and`, equality, relational, additive,
//! multiplicative, unary minus, union, path.

use super::lexer::{Lexer, Token};
use crate::error::CompileError;

#[derive(Debug, Clone)]
pub enum Expr {
    /// `/` — the document root.
    Root,
    Number(f64),
    Literal(String),
    Variable(String),
    Function(String, Vec<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    /// A step applied to the node-set produced by the base expression.
    Path(Box<Expr>, Step),
    /// A predicate over a primary expression's result.
    Filter(Box<Expr>, Box<Expr>),
    /// A step applied to the context node.
    RelativeStep(Step),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self_node() -> Step {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    SelfAxis,
    Attribute,
    Namespace,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "self" => Axis::SelfAxis,
            "attribute" => Axis::Attribute,
            "namespace" => Axis::Namespace,
            _ => return None,
        })
    }

    /// Reverse axes present nodes farthest-from-document-start last;
    /// `position()` counts along the axis direction.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Ancestor | Axis::AncestorOrSelf | Axis::Preceding | Axis::PrecedingSibling
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `*` — any node of the axis's principal kind.
    Any,
    /// Unprefixed name test; matches on local name.
    Name(String),
    /// `prefix:local`.
    Prefixed(String, String),
    /// `prefix:*`.
    PrefixWild(String),
    Node,
    Text,
    Comment,
    Pi(Option<String>),
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    cur_pos: usize,
    peeked: Option<(Token, usize)>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Result<Self, CompileError> {
        let mut lexer = Lexer::new(input);
        let (cur, cur_pos) = lexer.next_token()?;
        Ok(Parser {
            lexer,
            cur,
            cur_pos,
            peeked: None,
        })
    }

    pub fn parse(mut self) -> Result<Expr, CompileError> {
        let expr = self.parse_expr()?;
        if self.cur != Token::Eof {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }

    fn bump(&mut self) -> Result<(), CompileError> {
        let (t, p) = match self.peeked.take() {
            Some(tp) => tp,
            None => self.lexer.next_token()?,
        };
        self.cur = t;
        self.cur_pos = p;
        Ok(())
    }

    fn peek(&mut self) -> Result<&Token, CompileError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(&self.peeked.as_ref().expect("just filled").0)
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), CompileError> {
        if self.cur == token {
            self.bump()
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        CompileError::new(
            format!("expected {expected}, found {:?}", self.cur),
            self.cur_pos,
        )
    }

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        while self.cur == Token::Or {
            self.bump()?;
            let right = self.parse_and()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_equality()?;
        while self.cur == Token::And {
            self.bump()?;
            let right = self.parse_equality()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.cur {
                Token::Eq => BinaryOp::Eq,
                Token::Ne => BinaryOp::Ne,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_relational()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.cur {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_additive()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.cur {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.cur {
                Token::Multiply => BinaryOp::Mul,
                Token::Div => BinaryOp::Div,
                Token::Mod => BinaryOp::Mod,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.cur == Token::Minus {
            self.bump()?;
            let inner = self.parse_unary()?;
            Ok(Expr::Negate(Box::new(inner)))
        } else {
            self.parse_union()
        }
    }

    fn parse_union(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_path()?;
        while self.cur == Token::Pipe {
            self.bump()?;
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_path(&mut self) -> Result<Expr, CompileError> {
        let mut expr = if self.cur == Token::Slash {
            self.bump()?;
            if self.starts_step() {
                let step = self.parse_step()?;
                Expr::Path(Box::new(Expr::Root), step)
            } else {
                return Ok(Expr::Root);
            }
        } else if self.cur == Token::DoubleSlash {
            self.bump()?;
            let step = self.parse_step()?;
            Expr::Path(
                Box::new(Expr::Path(
                    Box::new(Expr::Root),
                    Step::descendant_or_self_node(),
                )),
                step,
            )
        } else if self.starts_primary() {
            return self.parse_filter();
        } else {
            Expr::RelativeStep(self.parse_step()?)
        };

        loop {
            match self.cur {
                Token::Slash => {
                    self.bump()?;
                    let step = self.parse_step()?;
                    expr = Expr::Path(Box::new(expr), step);
                }
                Token::DoubleSlash => {
                    self.bump()?;
                    let step = self.parse_step()?;
                    expr = Expr::Path(
                        Box::new(Expr::Path(Box::new(expr), Step::descendant_or_self_node())),
                        step,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn starts_primary(&mut self) -> bool {
        match &self.cur {
            Token::Dollar | Token::LParen | Token::Literal(_) | Token::Number(_) => true,
            // A name followed by '(' is a function call; node types were
            // already distinguished by the lexer.
            Token::Name(_) => matches!(self.peek(), Ok(&Token::LParen)),
            _ => false,
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.cur,
            Token::Name(_)
                | Token::QName(..)
                | Token::PrefixWild(_)
                | Token::NodeType(_)
                | Token::AxisName(_)
                | Token::Star
                | Token::At
                | Token::Dot
                | Token::DotDot
        )
    }

    /// FilterExpr: primary expression, predicates, then any `/`-continuation
    /// applied to the filtered result.
    fn parse_filter(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        while self.cur == Token::LBracket {
            self.bump()?;
            let pred = self.parse_expr()?;
            self.expect(Token::RBracket, "']'")?;
            expr = Expr::Filter(Box::new(expr), Box::new(pred));
        }
        loop {
            match self.cur {
                Token::Slash => {
                    self.bump()?;
                    let step = self.parse_step()?;
                    expr = Expr::Path(Box::new(expr), step);
                }
                Token::DoubleSlash => {
                    self.bump()?;
                    let step = self.parse_step()?;
                    expr = Expr::Path(
                        Box::new(Expr::Path(Box::new(expr), Step::descendant_or_self_node())),
                        step,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.cur.clone() {
            Token::Number(n) => {
                self.bump()?;
                Ok(Expr::Number(n))
            }
            Token::Literal(s) => {
                self.bump()?;
                Ok(Expr::Literal(s))
            }
            Token::Dollar => {
                self.bump()?;
                match self.cur.clone() {
                    Token::Name(name) => {
                        self.bump()?;
                        Ok(Expr::Variable(name))
                    }
                    Token::QName(p, l) => {
                        self.bump()?;
                        Ok(Expr::Variable(format!("{p}:{l}")))
                    }
                    _ => Err(self.unexpected("variable name")),
                }
            }
            Token::LParen => {
                self.bump()?;
                let expr = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            Token::Name(name) => {
                // Guaranteed function call by starts_primary.
                self.bump()?;
                self.expect(Token::LParen, "'('")?;
                let args = self.parse_args()?;
                Ok(Expr::Function(name, args))
            }
            _ => Err(self.unexpected("a primary expression")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if self.cur != Token::RParen {
            args.push(self.parse_expr()?);
            while self.cur == Token::Comma {
                self.bump()?;
                args.push(self.parse_expr()?);
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(args)
    }

    fn parse_step(&mut self) -> Result<Step, CompileError> {
        // Abbreviations first.
        match self.cur {
            Token::Dot => {
                self.bump()?;
                return Ok(Step {
                    axis: Axis::SelfAxis,
                    test: NodeTest::Node,
                    predicates: Vec::new(),
                });
            }
            Token::DotDot => {
                self.bump()?;
                return Ok(Step {
                    axis: Axis::Parent,
                    test: NodeTest::Node,
                    predicates: Vec::new(),
                });
            }
            _ => {}
        }

        let axis = match self.cur.clone() {
            Token::At => {
                self.bump()?;
                Axis::Attribute
            }
            Token::AxisName(name) => {
                let axis = Axis::from_name(&name)
                    .ok_or_else(|| CompileError::new(format!("unknown axis: {name}"), self.cur_pos))?;
                self.bump()?;
                axis
            }
            _ => Axis::Child,
        };

        let test = match self.cur.clone() {
            Token::Star => {
                self.bump()?;
                NodeTest::Any
            }
            Token::Name(name) => {
                self.bump()?;
                NodeTest::Name(name)
            }
            Token::QName(p, l) => {
                self.bump()?;
                NodeTest::Prefixed(p, l)
            }
            Token::PrefixWild(p) => {
                self.bump()?;
                NodeTest::PrefixWild(p)
            }
            Token::NodeType(t) => {
                self.bump()?;
                self.expect(Token::LParen, "'('")?;
                let arg = if let Token::Literal(s) = self.cur.clone() {
                    self.bump()?;
                    Some(s)
                } else {
                    None
                };
                self.expect(Token::RParen, "')'")?;
                match t.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    "processing-instruction" => NodeTest::Pi(arg),
                    other => {
                        return Err(CompileError::new(
                            format!("unknown node type: {other}"),
                            self.cur_pos,
                        ))
                    }
                }
            }
            _ => return Err(self.unexpected("a node test")),
        };

        let mut predicates = Vec::new();
        while self.cur == Token::LBracket {
            self.bump()?;
            predicates.push(self.parse_expr()?);
            self.expect(Token::RBracket, "']'")?;
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }
}

/// Parse an XPath 1.0 expression.
pub fn parse(input: &str) -> Result<Expr, CompileError> {
    Parser::new(input)?.parse()
}
